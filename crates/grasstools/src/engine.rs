use std::ffi::OsString;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::error::GrassError;
use crate::invocation::Invocation;

/// Runs engine modules. Implementations execute one invocation at a time and
/// return only once it has finished.
pub trait Engine: Send + Sync {
    fn run(&self, invocation: &Invocation) -> Result<(), GrassError>;
}

/// Environment handed to every child process of a session.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EngineEnv {
    vars: Vec<(String, OsString)>,
    search_path: Option<OsString>,
    cwd: Option<PathBuf>,
}

impl EngineEnv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn var(mut self, key: &str, value: impl Into<OsString>) -> Self {
        let value = value.into();
        if key == "PATH" {
            self.search_path = Some(value.clone());
        }
        self.vars.retain(|(name, _)| name != key);
        self.vars.push((key.to_string(), value));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&OsString> {
        self.vars
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value)
    }

    pub fn vars(&self) -> impl Iterator<Item = (&str, &OsString)> {
        self.vars.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Resolves an executable against this environment's `PATH` rather than
    /// the parent process's.
    pub fn resolve(&self, program: &str) -> PathBuf {
        let cwd = self
            .cwd
            .clone()
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."));
        match &self.search_path {
            Some(path) => which::which_in(program, Some(path), cwd),
            None => which::which(program),
        }
        .unwrap_or_else(|_| PathBuf::from(program))
    }

    pub(crate) fn command(&self, program: &str) -> Command {
        let mut command = Command::new(self.resolve(program));
        command.envs(self.vars.iter().map(|(name, value)| (name, value)));
        if let Some(cwd) = &self.cwd {
            command.current_dir(cwd);
        }
        command
    }
}

/// Engine backed by real module executables.
pub struct ProcessEngine {
    env: EngineEnv,
}

impl ProcessEngine {
    pub fn new(env: EngineEnv) -> Self {
        Self { env }
    }

    pub fn env(&self) -> &EngineEnv {
        &self.env
    }
}

impl Engine for ProcessEngine {
    fn run(&self, invocation: &Invocation) -> Result<(), GrassError> {
        debug!(command = %invocation.command_line(), "running module");
        let output = self
            .env
            .command(invocation.module())
            .args(invocation.args())
            .stdin(Stdio::null())
            .output()
            .map_err(|err| {
                GrassError::Module {
                    module: invocation.module().to_string(),
                    status: "not started".to_string(),
                    stderr: err.to_string(),
                }
            })?;

        if !output.status.success() {
            return Err(GrassError::module_failed(
                invocation.module(),
                output.status,
                &output.stderr,
            ));
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            debug!(module = invocation.module(), "{}", stderr.trim());
        }
        Ok(())
    }
}

/// Records invocations instead of running them.
#[derive(Default)]
pub struct RecordingEngine {
    invocations: Mutex<Vec<Invocation>>,
}

impl RecordingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.invocations.lock().clone()
    }

    pub fn modules(&self) -> Vec<String> {
        self.invocations
            .lock()
            .iter()
            .map(|inv| inv.module().to_string())
            .collect()
    }
}

impl Engine for RecordingEngine {
    fn run(&self, invocation: &Invocation) -> Result<(), GrassError> {
        info!(command = %invocation.command_line(), "planned");
        self.invocations.lock().push(invocation.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_engine_keeps_order() {
        let engine = RecordingEngine::new();
        engine.run(&Invocation::new("r.in.gdal")).unwrap();
        engine.run(&Invocation::new("r.hydrodem")).unwrap();
        assert_eq!(engine.modules(), vec!["r.in.gdal", "r.hydrodem"]);
    }

    #[test]
    fn env_var_replaces_previous_value() {
        let env = EngineEnv::new()
            .var("GISBASE", "/usr/lib/grass74")
            .var("GISBASE", "/opt/grass");
        assert_eq!(env.get("GISBASE"), Some(&OsString::from("/opt/grass")));
        assert_eq!(env.vars().count(), 1);
    }

    #[test]
    fn resolve_falls_back_to_bare_name() {
        let env = EngineEnv::new().var("PATH", "/nonexistent/grass/bin");
        assert_eq!(
            env.resolve("r.not.a.module"),
            PathBuf::from("r.not.a.module")
        );
    }

    #[cfg(unix)]
    #[test]
    fn process_engine_reports_failed_module() {
        let temp = tempfile::tempdir().unwrap();
        let script = temp.path().join("r.fails");
        std::fs::write(&script, "#!/bin/sh\necho \"ERROR: raster <dem> not found\" >&2\nexit 1\n")
            .unwrap();
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let engine = ProcessEngine::new(
            EngineEnv::new()
                .var("PATH", temp.path().as_os_str())
                .current_dir(temp.path()),
        );
        let err = engine
            .run(&Invocation::new("r.fails").param("input", "dem"))
            .expect_err("module should fail");
        match err {
            GrassError::Module {
                module,
                status,
                stderr,
            } => {
                assert_eq!(module, "r.fails");
                assert_eq!(status, "exit status 1");
                assert!(stderr.contains("raster <dem> not found"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
}
