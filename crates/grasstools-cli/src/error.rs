use std::fmt;
use std::process::ExitCode;

use clap::error::ErrorKind as ClapErrorKind;
use grasstools::GrassError;

const EX_OK: u8 = 0;
const EX_USAGE: u8 = 64;
const EX_SOFTWARE: u8 = 70;
const EX_OSERR: u8 = 71;
const EX_CANTCREAT: u8 = 73;
const EX_CONFIG: u8 = 78;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    Ok,
    Usage,
    Software,
    Io,
    CantCreate,
    Config,
}

impl ExitStatus {
    pub fn code(self) -> u8 {
        match self {
            ExitStatus::Ok => EX_OK,
            ExitStatus::Usage => EX_USAGE,
            ExitStatus::Software => EX_SOFTWARE,
            ExitStatus::Io => EX_OSERR,
            ExitStatus::CantCreate => EX_CANTCREAT,
            ExitStatus::Config => EX_CONFIG,
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    message: String,
    status: ExitStatus,
}

impl CliError {
    pub fn new(message: impl Into<String>, status: ExitStatus) -> Self {
        Self {
            message: message.into(),
            status,
        }
    }

    pub fn status(&self) -> ExitStatus {
        self.status
    }

    pub fn exit_code(&self) -> ExitCode {
        ExitCode::from(self.status.code())
    }

    pub fn print(&self) {
        if !self.message.is_empty() {
            eprintln!("{}", self.message);
        }
    }
}

impl From<GrassError> for CliError {
    fn from(err: GrassError) -> Self {
        match err {
            GrassError::LocationCreation {
                command_line,
                stderr,
            } => CliError::new(
                format!("ERROR: {stderr}\nERROR: Cannot generate location ({command_line})"),
                ExitStatus::CantCreate,
            ),
            GrassError::MissingInput(path) => CliError::new(
                format!("path '{}' does not exist", path.display()),
                ExitStatus::Usage,
            ),
            err @ (GrassError::InvalidParameter(_) | GrassError::Workspace(_)) => {
                CliError::new(err.to_string(), ExitStatus::Usage)
            }
            err @ (GrassError::Config(_) | GrassError::Serialization(_)) => {
                CliError::new(err.to_string(), ExitStatus::Config)
            }
            err @ GrassError::Module { .. } => CliError::new(err.to_string(), ExitStatus::Software),
            err @ GrassError::Io(_) => CliError::new(err.to_string(), ExitStatus::Io),
        }
    }
}

impl From<clap::Error> for CliError {
    fn from(err: clap::Error) -> Self {
        let status = match err.kind() {
            ClapErrorKind::DisplayHelp | ClapErrorKind::DisplayVersion => ExitStatus::Ok,
            _ => ExitStatus::Usage,
        };
        if status == ExitStatus::Ok {
            let _ = err.print();
            CliError::new(String::new(), status)
        } else {
            CliError::new(err.to_string(), status)
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::new(err.to_string(), ExitStatus::Io)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(err: serde_json::Error) -> Self {
        CliError::new(err.to_string(), ExitStatus::Software)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn location_failure_names_command_line() {
        let err = CliError::from(GrassError::LocationCreation {
            command_line: "\"/opt/grass/grass74\" -c epsg:1 -e /data/basin".into(),
            stderr: "invalid EPSG".into(),
        });
        assert_eq!(err.status(), ExitStatus::CantCreate);
        assert_eq!(
            err.to_string(),
            "ERROR: invalid EPSG\nERROR: Cannot generate location (\"/opt/grass/grass74\" -c epsg:1 -e /data/basin)"
        );
    }

    #[test]
    fn engine_errors_map_to_sysexits() {
        let module = CliError::from(GrassError::Module {
            module: "r.hydrodem".into(),
            status: "exit status 1".into(),
            stderr: String::new(),
        });
        assert_eq!(module.status().code(), 70);

        let missing = CliError::from(GrassError::MissingInput(PathBuf::from("dem.tif")));
        assert_eq!(missing.status().code(), 64);

        let config = CliError::from(GrassError::Config("no GISBASE".into()));
        assert_eq!(config.status().code(), 78);
    }
}
