use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde::Deserialize;
use tracing::debug;

use crate::error::GrassError;

/// File looked up in the working directory when no `--config` is given.
pub const CONFIG_FILE_NAME: &str = "grasstool.yaml";

/// Startup executable shipped inside a GRASS 7.4 installation.
#[cfg(windows)]
pub const DEFAULT_LAUNCHER: &str = "grass74.bat";
#[cfg(not(windows))]
pub const DEFAULT_LAUNCHER: &str = "grass74";

/// Launcher names searched on `PATH` when no installation is configured.
const PATH_LAUNCHERS: &[&str] = &["grass74", "grass"];

/// User settings from the YAML config file, overlaid by command-line flags.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub gisbase: Option<PathBuf>,
    pub grass: Option<String>,
    pub dbase: Option<PathBuf>,
    pub mapset: Option<String>,
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self, GrassError> {
        let raw = fs::read_to_string(path)
            .map_err(|err| GrassError::Config(format!("{}: {err}", path.display())))?;
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str::<Self>(&raw)
            .map_err(|err| GrassError::from(err).context(path.display()))
    }

    /// Loads `grasstool.yaml` from `dir` when present.
    pub fn discover(dir: &Path) -> Result<Self, GrassError> {
        let candidate = dir.join(CONFIG_FILE_NAME);
        if candidate.is_file() {
            debug!(path = %candidate.display(), "loading config file");
            Self::load(&candidate)
        } else {
            Ok(Self::default())
        }
    }

    /// Values set in `overrides` win over values in `self`.
    pub fn overlay(self, overrides: Settings) -> Self {
        Self {
            gisbase: overrides.gisbase.or(self.gisbase),
            grass: overrides.grass.or(self.grass),
            dbase: overrides.dbase.or(self.dbase),
            mapset: overrides.mapset.or(self.mapset),
        }
    }
}

/// Location of the engine installation and its startup executable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    gisbase: PathBuf,
    executable: PathBuf,
}

impl EngineConfig {
    pub fn new(gisbase: impl Into<PathBuf>, executable: impl Into<PathBuf>) -> Self {
        Self {
            gisbase: gisbase.into(),
            executable: executable.into(),
        }
    }

    /// Resolves the installation from settings, then the inherited `GISBASE`
    /// value, then a launcher found on `PATH`.
    pub fn resolve(settings: &Settings, env_gisbase: Option<OsString>) -> Result<Self, GrassError> {
        let configured = settings
            .gisbase
            .clone()
            .or_else(|| env_gisbase.filter(|v| !v.is_empty()).map(PathBuf::from));

        let gisbase = match configured {
            Some(gisbase) => gisbase,
            None => {
                let launcher = find_launcher(settings.grass.as_deref()).ok_or_else(|| {
                    GrassError::Config(
                        "GRASS installation not found; set --gisbase, GISBASE, or gisbase in grasstool.yaml"
                            .into(),
                    )
                })?;
                let gisbase = query_gisbase(&launcher)?;
                return Ok(Self::new(gisbase, launcher));
            }
        };

        if !gisbase.is_dir() {
            return Err(GrassError::Config(format!(
                "GISBASE {} is not a directory",
                gisbase.display()
            )));
        }

        let executable = launcher_in(&gisbase, settings.grass.as_deref());
        Ok(Self::new(gisbase, executable))
    }

    /// Installation as configured, without checking that it exists or
    /// querying a launcher. Only meant for printing planned commands.
    pub fn unresolved(settings: &Settings) -> Self {
        let gisbase = settings.gisbase.clone().unwrap_or_default();
        let name = settings.grass.as_deref().unwrap_or(DEFAULT_LAUNCHER);
        let executable = if gisbase.as_os_str().is_empty() {
            PathBuf::from(name)
        } else {
            gisbase.join(name)
        };
        Self::new(gisbase, executable)
    }

    pub fn gisbase(&self) -> &Path {
        &self.gisbase
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    pub fn bin_dir(&self) -> PathBuf {
        self.gisbase.join("bin")
    }

    pub fn scripts_dir(&self) -> PathBuf {
        self.gisbase.join("scripts")
    }

    pub fn lib_dir(&self) -> PathBuf {
        self.gisbase.join("lib")
    }
}

/// A launcher given as a path is used as-is; a bare name is looked up inside
/// the installation first and on `PATH` after that.
fn launcher_in(gisbase: &Path, grass: Option<&str>) -> PathBuf {
    let name = grass.unwrap_or(DEFAULT_LAUNCHER);
    let as_path = Path::new(name);
    if as_path.components().count() > 1 || as_path.is_absolute() {
        return as_path.to_path_buf();
    }

    let bundled = gisbase.join(name);
    if bundled.is_file() {
        return bundled;
    }
    which::which(name).unwrap_or(bundled)
}

fn find_launcher(grass: Option<&str>) -> Option<PathBuf> {
    if let Some(name) = grass {
        let path = Path::new(name);
        if path.is_file() {
            return Some(path.to_path_buf());
        }
        return which::which(name).ok();
    }
    PATH_LAUNCHERS
        .iter()
        .find_map(|name| which::which(name).ok())
}

/// Asks the launcher for its installation directory (`--config path`).
fn query_gisbase(launcher: &Path) -> Result<PathBuf, GrassError> {
    let output = Command::new(launcher)
        .args(["--config", "path"])
        .output()
        .map_err(|err| GrassError::Config(format!("{}: {err}", launcher.display())))?;
    if !output.status.success() {
        return Err(GrassError::Config(format!(
            "{} --config path failed: {}",
            launcher.display(),
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    let gisbase = String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(PathBuf::from)
        .ok_or_else(|| {
            GrassError::Config(format!(
                "{} --config path returned no installation directory",
                launcher.display()
            ))
        })?;
    debug!(gisbase = %gisbase.display(), launcher = %launcher.display(), "discovered GISBASE");
    Ok(gisbase)
}
