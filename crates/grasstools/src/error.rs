use std::fmt;
use std::path::PathBuf;
use std::process::ExitStatus;

use thiserror::Error;

/// High-level error type shared across grasstools components.
#[derive(Debug, Error)]
pub enum GrassError {
    #[error("workspace error: {0}")]
    Workspace(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("missing input: {0}")]
    MissingInput(PathBuf),
    #[error("cannot generate location ({command_line}): {stderr}")]
    LocationCreation { command_line: String, stderr: String },
    #[error("module {module} failed ({status}): {stderr}")]
    Module {
        module: String,
        status: String,
        stderr: String,
    },
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_yaml::Error> for GrassError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl GrassError {
    pub fn context<T: fmt::Display>(self, ctx: T) -> Self {
        match self {
            GrassError::Workspace(msg) => GrassError::Workspace(format!("{ctx}: {msg}")),
            GrassError::Config(msg) => GrassError::Config(format!("{ctx}: {msg}")),
            GrassError::InvalidParameter(msg) => {
                GrassError::InvalidParameter(format!("{ctx}: {msg}"))
            }
            GrassError::Serialization(msg) => GrassError::Serialization(format!("{ctx}: {msg}")),
            other => other,
        }
    }

    pub(crate) fn module_failed(module: &str, status: ExitStatus, stderr: &[u8]) -> Self {
        GrassError::Module {
            module: module.to_string(),
            status: describe_status(status),
            stderr: String::from_utf8_lossy(stderr).trim().to_string(),
        }
    }
}

fn describe_status(status: ExitStatus) -> String {
    match status.code() {
        Some(code) => format!("exit status {code}"),
        None => "terminated by signal".to_string(),
    }
}
