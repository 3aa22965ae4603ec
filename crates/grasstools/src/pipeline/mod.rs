//! Fixed sequences of engine invocations, one per subcommand.
//!
//! Every pipeline first describes its layers in a context struct, builds a
//! [`Plan`] from it, and only then hands the plan to an [`Engine`].

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::info;

use crate::engine::Engine;
use crate::error::GrassError;
use crate::invocation::Invocation;

pub mod hydrolines;
pub mod paths;
pub mod sinks;
pub mod steps;
pub mod terraflow;

pub use hydrolines::{Hydrolines, HydrolinesLayers, HydrolinesParams};
pub use paths::{PathLayers, PathParams, Paths};
pub use sinks::{SinkLayers, SinkParams, Sinks};
pub use terraflow::{Terraflow, TerraflowLayers, TerraflowParams};

/// One invocation, optionally announced with a progress message.
#[derive(Clone, Debug, PartialEq)]
pub struct Step {
    pub message: Option<String>,
    pub invocation: Invocation,
}

/// Ordered invocations plus the files they leave in the output directory.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Plan {
    steps: Vec<Step>,
    outputs: Vec<PathBuf>,
    pending: Option<String>,
}

impl Plan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn announce(&mut self, message: impl Into<String>, invocation: Invocation) {
        self.steps.push(Step {
            message: Some(message.into()),
            invocation,
        });
    }

    /// Attaches `message` to whichever step is pushed next.
    pub fn section(&mut self, message: impl Into<String>) {
        self.pending = Some(message.into());
    }

    pub fn push(&mut self, invocation: Invocation) {
        self.steps.push(Step {
            message: self.pending.take(),
            invocation,
        });
    }

    pub fn export(&mut self, invocation: Invocation, output: PathBuf) {
        self.push(invocation);
        self.outputs.push(output);
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn invocations(&self) -> impl Iterator<Item = &Invocation> {
        self.steps.iter().map(|step| &step.invocation)
    }

    pub fn outputs(&self) -> &[PathBuf] {
        &self.outputs
    }

    /// Runs every step in order, stopping at the first failure.
    pub fn execute(
        &self,
        pipeline: &str,
        layer: &str,
        engine: &dyn Engine,
    ) -> Result<PipelineReport, GrassError> {
        self.execute_since(Instant::now(), pipeline, layer, engine)
    }

    /// Like [`Plan::execute`], with the elapsed time measured from `started`.
    pub fn execute_since(
        &self,
        started: Instant,
        pipeline: &str,
        layer: &str,
        engine: &dyn Engine,
    ) -> Result<PipelineReport, GrassError> {
        for step in &self.steps {
            if let Some(message) = &step.message {
                info!("{message}");
            }
            engine.run(&step.invocation)?;
        }
        let elapsed = started.elapsed();
        info!("Finished in: {}", format_elapsed(elapsed));

        Ok(PipelineReport {
            pipeline: pipeline.to_string(),
            layer: layer.to_string(),
            steps: self.steps.len(),
            outputs: self.outputs.clone(),
            elapsed: format_elapsed(elapsed),
        })
    }
}

/// Summary of a finished pipeline.
#[derive(Clone, Debug, Serialize)]
pub struct PipelineReport {
    pub pipeline: String,
    /// Layer the input elevation raster was imported as.
    pub layer: String,
    pub steps: usize,
    pub outputs: Vec<PathBuf>,
    pub elapsed: String,
}

/// Common shape of the subcommand pipelines.
pub trait Pipeline {
    fn name(&self) -> &'static str;

    /// Elevation raster the pipeline starts from.
    fn input(&self) -> &Path;

    /// Layer the input raster is imported as.
    fn layer(&self) -> &str;

    fn plan(&self, dst: &Path) -> Plan;

    fn run(&self, engine: &dyn Engine, dst: &Path) -> Result<PipelineReport, GrassError> {
        self.run_since(Instant::now(), engine, dst)
    }

    /// Runs the pipeline, counting the elapsed time from `started` so that
    /// opening the session is included.
    fn run_since(
        &self,
        started: Instant,
        engine: &dyn Engine,
        dst: &Path,
    ) -> Result<PipelineReport, GrassError> {
        self.plan(dst)
            .execute_since(started, self.name(), self.layer(), engine)
    }
}

/// Layer name for an input file: the base name up to the first `.`, with
/// characters the engine rejects replaced by `_`.
pub fn layer_name(path: &Path) -> Result<String, GrassError> {
    let base = path
        .file_name()
        .and_then(|name| name.to_str())
        .and_then(|name| name.split('.').next())
        .unwrap_or_default();
    if base.is_empty() {
        return Err(GrassError::InvalidParameter(format!(
            "cannot derive a layer name from {}",
            path.display()
        )));
    }

    let mut name: String = base
        .chars()
        .map(|ch| if ch.is_ascii_alphanumeric() || ch == '_' { ch } else { '_' })
        .collect();
    if name.starts_with(|ch: char| ch.is_ascii_digit()) {
        name.insert_str(0, "r_");
    }
    Ok(name)
}

/// Appends `suffix` to `name` until it differs from every layer in `taken`.
///
/// Intermediate layers are written with `--overwrite`, so an input layer
/// sharing one of their names would be replaced mid-pipeline.
pub(crate) fn distinct_layer(mut name: String, taken: &[&str], suffix: &str) -> String {
    while taken.contains(&name.as_str()) {
        name.push_str(suffix);
    }
    name
}

pub fn require_file(path: &Path) -> Result<(), GrassError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(GrassError::MissingInput(path.to_path_buf()))
    }
}

pub fn require_dir(path: &Path) -> Result<(), GrassError> {
    if path.is_dir() {
        Ok(())
    } else {
        Err(GrassError::MissingInput(path.to_path_buf()))
    }
}

/// `H:MM:SS`
pub fn format_elapsed(elapsed: Duration) -> String {
    let total = elapsed.as_secs();
    let (minutes, seconds) = (total / 60, total % 60);
    let (hours, minutes) = (minutes / 60, minutes % 60);
    format!("{hours}:{minutes:02}:{seconds:02}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::RecordingEngine;

    #[test]
    fn layer_name_stops_at_first_dot() {
        assert_eq!(layer_name(Path::new("/data/dem.v2.tif")).unwrap(), "dem");
        assert_eq!(layer_name(Path::new("heads.shp")).unwrap(), "heads");
    }

    #[test]
    fn layer_name_sanitizes_characters() {
        assert_eq!(
            layer_name(Path::new("/data/lidar-2019 tile.tif")).unwrap(),
            "lidar_2019_tile"
        );
        assert_eq!(layer_name(Path::new("2019dem.tif")).unwrap(), "r_2019dem");
        assert!(layer_name(Path::new("/data/.tif")).is_err());
    }

    #[test]
    fn distinct_layer_suffixes_until_free() {
        assert_eq!(distinct_layer("dem".into(), &["acc", "dirs"], "_dem"), "dem");
        assert_eq!(distinct_layer("acc".into(), &["acc", "dirs"], "_dem"), "acc_dem");
        assert_eq!(
            distinct_layer("acc".into(), &["acc", "acc_dem"], "_dem"),
            "acc_dem_dem"
        );
    }

    #[test]
    fn elapsed_renders_hours_minutes_seconds() {
        assert_eq!(format_elapsed(Duration::from_secs(0)), "0:00:00");
        assert_eq!(format_elapsed(Duration::from_secs(65)), "0:01:05");
        assert_eq!(format_elapsed(Duration::from_secs(3 * 3600 + 7)), "3:00:07");
    }

    #[test]
    fn plan_execute_runs_steps_in_order() {
        let mut plan = Plan::new();
        plan.announce("Loading DEM", Invocation::new("r.in.gdal"));
        plan.push(Invocation::new("r.hydrodem"));
        plan.section("Exporting");
        plan.export(Invocation::new("r.out.gdal"), PathBuf::from("/out/fac.tif"));

        let engine = RecordingEngine::new();
        let report = plan.execute("demo", "dem", &engine).unwrap();

        assert_eq!(engine.modules(), vec!["r.in.gdal", "r.hydrodem", "r.out.gdal"]);
        assert_eq!(report.steps, 3);
        assert_eq!(report.outputs, vec![PathBuf::from("/out/fac.tif")]);
        assert_eq!(report.pipeline, "demo");
        assert_eq!(plan.steps()[1].message, None);
        assert_eq!(plan.steps()[2].message.as_deref(), Some("Exporting"));
    }

    #[test]
    fn elapsed_counts_from_given_start() {
        let mut plan = Plan::new();
        plan.push(Invocation::new("r.in.gdal"));
        let started = Instant::now()
            .checked_sub(Duration::from_secs(65))
            .expect("clock is past 65s");

        let report = plan
            .execute_since(started, "demo", "dem", &RecordingEngine::new())
            .unwrap();
        assert_eq!(report.elapsed, "0:01:05");
    }

    struct FailingEngine;

    impl Engine for FailingEngine {
        fn run(&self, invocation: &Invocation) -> Result<(), GrassError> {
            Err(GrassError::Module {
                module: invocation.module().to_string(),
                status: "exit status 1".into(),
                stderr: String::new(),
            })
        }
    }

    #[test]
    fn plan_execute_stops_at_first_failure() {
        let mut plan = Plan::new();
        plan.push(Invocation::new("r.in.gdal"));
        plan.push(Invocation::new("r.hydrodem"));

        let err = plan.execute("demo", "dem", &FailingEngine).unwrap_err();
        assert!(matches!(err, GrassError::Module { module, .. } if module == "r.in.gdal"));
    }

    #[test]
    fn require_helpers_report_missing_paths() {
        let temp = tempfile::tempdir().unwrap();
        assert!(require_dir(temp.path()).is_ok());
        assert!(matches!(
            require_file(temp.path()),
            Err(GrassError::MissingInput(_))
        ));
        assert!(require_dir(&temp.path().join("absent")).is_err());
    }
}
