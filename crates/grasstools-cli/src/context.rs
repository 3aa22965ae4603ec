use std::env;
use std::path::{Path, PathBuf};
use std::time::Instant;

use grasstools::session::{mapset_invocation, startup_command_line};
use grasstools::{
    EngineConfig, Georeference, Pipeline, RecordingEngine, Session, SessionRequest, Settings,
    default_dbase,
};
use tracing::warn;

use crate::commands::CommandResult;
use crate::error::CliError;
use crate::util::Verbosity;

/// Global options shared by every subcommand.
pub struct CliContext {
    pub settings: Settings,
    pub dbase: PathBuf,
    pub location: Option<String>,
    pub epsg: Option<u32>,
    pub dry_run: bool,
    pub verbosity: Verbosity,
}

impl CliContext {
    /// Merges the config file (explicit or discovered in the working
    /// directory) with command-line flags.
    pub fn bootstrap(
        config_file: Option<&Path>,
        overrides: Settings,
        location: Option<String>,
        epsg: Option<u32>,
        dry_run: bool,
        verbosity: Verbosity,
    ) -> Result<Self, CliError> {
        let from_file = match config_file {
            Some(path) => Settings::load(path)?,
            None => Settings::discover(&env::current_dir()?)?,
        };
        let settings = from_file.overlay(overrides);
        let dbase = match &settings.dbase {
            Some(dbase) => dbase.clone(),
            None => default_dbase()?,
        };

        Ok(Self {
            settings,
            dbase,
            location,
            epsg,
            dry_run,
            verbosity,
        })
    }

    pub fn engine_config(&self) -> Result<EngineConfig, CliError> {
        Ok(EngineConfig::resolve(
            &self.settings,
            env::var_os("GISBASE"),
        )?)
    }

    /// Locations are keyed by the EPSG code when one was given, otherwise by
    /// the projection of the input raster.
    pub fn session_request(&self, input: &Path) -> SessionRequest {
        let georeference = match self.epsg {
            Some(code) => Georeference::Epsg(code),
            None => Georeference::File(input.to_path_buf()),
        };
        SessionRequest {
            dbase: self.dbase.clone(),
            location: self.location.clone(),
            mapset: self.settings.mapset.clone(),
            georeference,
        }
    }

    /// Opens a session for the pipeline's input and runs it, or only prints
    /// the commands it would issue with `--dry-run`.
    pub fn run_pipeline(
        &self,
        pipeline: &dyn Pipeline,
        dst: &Path,
    ) -> Result<CommandResult, CliError> {
        let started = Instant::now();
        let request = self.session_request(pipeline.input());

        if self.dry_run {
            let config = self.engine_config().unwrap_or_else(|err| {
                warn!("{err}; showing the default launcher");
                EngineConfig::unresolved(&self.settings)
            });
            let paths = request.resolve_paths()?;
            let mut commands = Vec::new();
            if !paths.location_exists() {
                commands.push(startup_command_line(
                    &config,
                    &paths.location_path(),
                    &request.georeference,
                ));
            }
            if !paths.mapset().is_permanent() {
                commands.push(mapset_invocation(&paths).command_line());
            }

            let engine = RecordingEngine::new();
            let report = pipeline.run(&engine, dst)?;
            commands.extend(engine.invocations().iter().map(|inv| inv.command_line()));

            return Ok(CommandResult::PipelinePlanned {
                pipeline: report.pipeline,
                location: paths.location_path().display().to_string(),
                mapset: paths.mapset().to_string(),
                commands,
                outputs: display_paths(&report.outputs),
            });
        }

        let session = Session::open(self.engine_config()?, &request)?;
        if self.verbosity.verbose {
            tracing::info!(
                gisbase = %session.config().gisbase().display(),
                location = %session.paths().location_path().display(),
                mapset = %session.paths().mapset(),
                gisrc = %session.gisrc_path().display(),
                "resolved session"
            );
        }
        let report = pipeline.run_since(started, &session.engine(), dst)?;

        Ok(CommandResult::PipelineCompleted {
            pipeline: report.pipeline,
            layer: report.layer,
            location: session.paths().location_path().display().to_string(),
            mapset: session.paths().mapset().to_string(),
            created: session.created(),
            outputs: display_paths(&report.outputs),
            elapsed: report.elapsed,
        })
    }
}

fn display_paths(paths: &[PathBuf]) -> Vec<String> {
    paths.iter().map(|path| path.display().to_string()).collect()
}
