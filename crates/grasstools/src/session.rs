use std::env;
use std::ffi::OsString;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::engine::{Engine, EngineEnv, ProcessEngine};
use crate::error::GrassError;
use crate::invocation::Invocation;
use crate::workspace::{LocationName, MapsetName, WorkspacePaths};

/// Spatial reference a new location is created with.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Georeference {
    Epsg(u32),
    /// Copy the projection of an existing georeferenced file.
    File(PathBuf),
}

impl fmt::Display for Georeference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Georeference::Epsg(code) => write!(f, "epsg:{code}"),
            Georeference::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// What the caller wants opened.
#[derive(Clone, Debug)]
pub struct SessionRequest {
    pub dbase: PathBuf,
    pub location: Option<String>,
    pub mapset: Option<String>,
    pub georeference: Georeference,
}

impl SessionRequest {
    /// Fixes the location and mapset names, generating a location name when
    /// none was supplied.
    pub fn resolve_paths(&self) -> Result<WorkspacePaths, GrassError> {
        let location = LocationName::resolve(self.location.as_deref())?;
        let mapset = match self.mapset.as_deref() {
            Some(name) => MapsetName::new(name)?,
            None => MapsetName::permanent(),
        };
        Ok(WorkspacePaths::new(self.dbase.clone(), location, mapset))
    }
}

/// An open location/mapset with the environment its modules run in.
///
/// The gisrc file backing the session lives in a temp file and is removed
/// when the session is dropped.
pub struct Session {
    config: EngineConfig,
    paths: WorkspacePaths,
    gisrc: NamedTempFile,
    created: bool,
}

impl Session {
    /// Creates (or reuses) the location, then opens the requested mapset.
    pub fn open(config: EngineConfig, request: &SessionRequest) -> Result<Self, GrassError> {
        let paths = request.resolve_paths()?;
        Self::open_paths(config, paths, &request.georeference)
    }

    pub fn open_paths(
        config: EngineConfig,
        paths: WorkspacePaths,
        georeference: &Georeference,
    ) -> Result<Self, GrassError> {
        let location_path = paths.location_path();
        let created = if paths.location_exists() {
            info!(location = %location_path.display(), "Using existing location");
            false
        } else {
            fs::create_dir_all(paths.dbase())?;
            create_location(&config, &location_path, georeference)?;
            info!("Created location {}", location_path.display());
            true
        };

        let permanent = paths.with_mapset(MapsetName::permanent());
        let gisrc = write_gisrc(&permanent)?;
        let mut session = Self {
            config,
            paths: permanent,
            gisrc,
            created,
        };

        if !paths.mapset().is_permanent() {
            info!(mapset = %paths.mapset(), "create mapset...");
            session.engine().run(&mapset_invocation(&paths))?;
            session.gisrc = write_gisrc(&paths)?;
            session.paths = paths;
        }

        debug!(
            location = %session.paths.location(),
            mapset = %session.paths.mapset(),
            gisrc = %session.gisrc.path().display(),
            "session open"
        );
        Ok(session)
    }

    pub fn paths(&self) -> &WorkspacePaths {
        &self.paths
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// True when this session created the location rather than reusing one.
    pub fn created(&self) -> bool {
        self.created
    }

    pub fn gisrc_path(&self) -> &Path {
        self.gisrc.path()
    }

    pub fn env(&self) -> EngineEnv {
        session_env(
            &self.config,
            self.gisrc.path(),
            env::var_os("PATH"),
            env::var_os(LIBRARY_PATH_VAR),
        )
    }

    /// Engine whose child processes see this session's environment.
    pub fn engine(&self) -> ProcessEngine {
        ProcessEngine::new(self.env())
    }
}

/// `"<executable>" -c <georeference> -e <location_path>`
pub fn startup_command_line(
    config: &EngineConfig,
    location_path: &Path,
    georeference: &Georeference,
) -> String {
    format!(
        "\"{}\" -c {} -e {}",
        config.executable().display(),
        georeference,
        location_path.display()
    )
}

/// `g.mapset -c` invocation that creates and switches to the requested mapset.
pub fn mapset_invocation(paths: &WorkspacePaths) -> Invocation {
    Invocation::new("g.mapset")
        .flags("c")
        .param("mapset", paths.mapset())
        .param("location", paths.location())
        .param("dbase", paths.dbase().display())
}

fn create_location(
    config: &EngineConfig,
    location_path: &Path,
    georeference: &Georeference,
) -> Result<(), GrassError> {
    let command_line = startup_command_line(config, location_path, georeference);
    debug!(command = %command_line, "creating location");

    let mut command = Command::new(config.executable());
    command.arg("-c");
    match georeference {
        Georeference::Epsg(code) => command.arg(format!("epsg:{code}")),
        Georeference::File(path) => command.arg(path),
    };
    let output = command
        .arg("-e")
        .arg(location_path)
        .stdin(Stdio::null())
        .output()
        .map_err(|err| GrassError::LocationCreation {
            command_line: command_line.clone(),
            stderr: err.to_string(),
        })?;

    if !output.status.success() {
        return Err(GrassError::LocationCreation {
            command_line,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(())
}

pub(crate) fn gisrc_contents(paths: &WorkspacePaths) -> String {
    format!(
        "GISDBASE: {}\nLOCATION_NAME: {}\nMAPSET: {}\nGUI: text\n",
        paths.dbase().display(),
        paths.location(),
        paths.mapset()
    )
}

fn write_gisrc(paths: &WorkspacePaths) -> Result<NamedTempFile, GrassError> {
    let mut file = tempfile::Builder::new().prefix("gisrc-").tempfile()?;
    file.write_all(gisrc_contents(paths).as_bytes())?;
    file.flush()?;
    Ok(file)
}

#[cfg(windows)]
const LIBRARY_PATH_VAR: &str = "PATH";
#[cfg(target_os = "macos")]
const LIBRARY_PATH_VAR: &str = "DYLD_LIBRARY_PATH";
#[cfg(all(unix, not(target_os = "macos")))]
const LIBRARY_PATH_VAR: &str = "LD_LIBRARY_PATH";

pub(crate) fn session_env(
    config: &EngineConfig,
    gisrc: &Path,
    inherited_path: Option<OsString>,
    inherited_libs: Option<OsString>,
) -> EngineEnv {
    let mut search = vec![config.bin_dir(), config.scripts_dir()];
    if cfg!(windows) {
        search.push(config.lib_dir());
    }
    let path = prepend(search, inherited_path);

    let mut env = EngineEnv::new()
        .var("GISBASE", config.gisbase().as_os_str())
        .var("GISRC", gisrc.as_os_str())
        .var(
            "PYTHONPATH",
            prepend(
                vec![config.gisbase().join("etc").join("python")],
                env::var_os("PYTHONPATH"),
            ),
        )
        .var("PATH", path);
    if LIBRARY_PATH_VAR != "PATH" {
        env = env.var(LIBRARY_PATH_VAR, prepend(vec![config.lib_dir()], inherited_libs));
    }
    env
}

fn prepend(mut dirs: Vec<PathBuf>, inherited: Option<OsString>) -> OsString {
    if let Some(existing) = inherited {
        dirs.extend(env::split_paths(&existing));
    }
    env::join_paths(dirs.iter()).unwrap_or_else(|_| {
        dirs.first()
            .map(|dir| dir.as_os_str().to_owned())
            .unwrap_or_default()
    })
}
