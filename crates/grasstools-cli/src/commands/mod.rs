use serde::Serialize;

use crate::error::ExitStatus;

pub mod clean;
pub mod hydrolines;
pub mod paths;
pub mod sinks;
pub mod terraflow;

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CommandResult {
    PipelineCompleted {
        pipeline: String,
        layer: String,
        location: String,
        mapset: String,
        created: bool,
        outputs: Vec<String>,
        elapsed: String,
    },
    PipelinePlanned {
        pipeline: String,
        location: String,
        mapset: String,
        commands: Vec<String>,
        outputs: Vec<String>,
    },
    LocationRemoved {
        path: String,
        files: usize,
    },
}

impl CommandResult {
    pub fn exit_status(&self) -> ExitStatus {
        ExitStatus::Ok
    }
}
