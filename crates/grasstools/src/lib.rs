pub mod config;
pub mod engine;
pub mod error;
pub mod invocation;
pub mod pipeline;
pub mod session;
pub mod workspace;

pub use config::{CONFIG_FILE_NAME, EngineConfig, Settings};
pub use engine::{Engine, EngineEnv, ProcessEngine, RecordingEngine};
pub use error::GrassError;
pub use invocation::Invocation;
pub use pipeline::{
    Hydrolines, HydrolinesParams, PathParams, Paths, Pipeline, PipelineReport, Plan, SinkParams,
    Sinks, Terraflow, TerraflowParams,
};
pub use session::{Georeference, Session, SessionRequest};
pub use workspace::{
    LocationName, MapsetName, PERMANENT, RemovedLocation, WorkspacePaths, clean, default_dbase,
};
