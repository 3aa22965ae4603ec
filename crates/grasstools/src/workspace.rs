use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;
use tracing::info;
use walkdir::WalkDir;

use crate::error::GrassError;

/// Mapset every location is created with; used when no mapset is requested.
pub const PERMANENT: &str = "PERMANENT";

const LOCATION_ID_BYTES: usize = 16;

fn name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9_.\-]*$").expect("static name pattern compiles")
    })
}

fn validate_name(value: &str, kind: &str) -> Result<(), GrassError> {
    if value.is_empty() {
        return Err(GrassError::InvalidParameter(format!(
            "{kind} name must not be empty"
        )));
    }
    if !name_pattern().is_match(value) {
        return Err(GrassError::InvalidParameter(format!(
            "{kind} name '{value}' may only contain letters, digits, '_', '.' and '-'"
        )));
    }
    Ok(())
}

/// Name of a location inside the GIS database.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct LocationName(String);

impl LocationName {
    pub fn new(value: impl Into<String>) -> Result<Self, GrassError> {
        let value = value.into();
        validate_name(&value, "location")?;
        Ok(Self(value))
    }

    /// Generates a unique 32 character hex name from 16 random bytes.
    pub fn generate() -> Result<Self, GrassError> {
        let mut bytes = [0u8; LOCATION_ID_BYTES];
        getrandom::getrandom(&mut bytes).map_err(|err| {
            GrassError::Workspace(format!("unable to generate location name: {err}"))
        })?;
        Ok(Self(hex::encode(bytes)))
    }

    /// Uses the supplied name, or generates one when absent.
    pub fn resolve(value: Option<&str>) -> Result<Self, GrassError> {
        match value {
            Some(name) => Self::new(name),
            None => Self::generate(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LocationName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Name of a mapset inside a location.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct MapsetName(String);

impl MapsetName {
    pub fn new(value: impl Into<String>) -> Result<Self, GrassError> {
        let value = value.into();
        validate_name(&value, "mapset")?;
        Ok(Self(value))
    }

    pub fn permanent() -> Self {
        Self(PERMANENT.to_string())
    }

    pub fn is_permanent(&self) -> bool {
        self.0 == PERMANENT
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for MapsetName {
    fn default() -> Self {
        Self::permanent()
    }
}

impl fmt::Display for MapsetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Platform-specific default GIS database directory.
///
/// Windows keeps it under `Documents`, every other platform directly in the
/// home directory.
pub fn default_dbase() -> Result<PathBuf, GrassError> {
    let home = dirs::home_dir().ok_or_else(|| {
        GrassError::Config("unable to determine the home directory for grassdata".into())
    })?;
    Ok(dbase_under(&home, cfg!(windows)))
}

pub(crate) fn dbase_under(home: &Path, windows: bool) -> PathBuf {
    if windows {
        home.join("Documents").join("grassdata")
    } else {
        home.join("grassdata")
    }
}

/// Canonical paths for a location and its active mapset.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkspacePaths {
    dbase: PathBuf,
    location: LocationName,
    mapset: MapsetName,
}

impl WorkspacePaths {
    pub fn new(dbase: PathBuf, location: LocationName, mapset: MapsetName) -> Self {
        Self {
            dbase,
            location,
            mapset,
        }
    }

    /// Returns the GIS database directory.
    pub fn dbase(&self) -> &Path {
        &self.dbase
    }

    pub fn location(&self) -> &LocationName {
        &self.location
    }

    pub fn mapset(&self) -> &MapsetName {
        &self.mapset
    }

    /// Location directory (`{dbase}/{location}`).
    pub fn location_path(&self) -> PathBuf {
        self.dbase.join(self.location.as_str())
    }

    /// Mapset directory (`{dbase}/{location}/{mapset}`).
    pub fn mapset_path(&self) -> PathBuf {
        self.location_path().join(self.mapset.as_str())
    }

    /// A location is usable once its `PERMANENT` mapset directory exists.
    pub fn location_exists(&self) -> bool {
        self.location_path().join(PERMANENT).is_dir()
    }

    pub(crate) fn with_mapset(&self, mapset: MapsetName) -> Self {
        Self {
            dbase: self.dbase.clone(),
            location: self.location.clone(),
            mapset,
        }
    }
}

/// Outcome of [`clean`].
#[derive(Clone, Debug, Serialize)]
pub struct RemovedLocation {
    pub path: PathBuf,
    pub files: usize,
}

/// Recursively removes a location directory.
pub fn clean(location_path: &Path) -> Result<RemovedLocation, GrassError> {
    if !location_path.is_dir() {
        return Err(GrassError::Workspace(format!(
            "location {} does not exist",
            location_path.display()
        )));
    }

    let files = WalkDir::new(location_path)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .count();

    info!(path = %location_path.display(), "removing location");
    fs::remove_dir_all(location_path)?;

    Ok(RemovedLocation {
        path: location_path.to_path_buf(),
        files,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn generated_location_is_32_hex_chars() {
        let name = LocationName::generate().unwrap();
        assert_eq!(name.as_str().len(), 32);
        assert!(name.as_str().chars().all(|ch| ch.is_ascii_hexdigit()));
        assert!(name.as_str().chars().all(|ch| !ch.is_ascii_uppercase()));
    }

    #[test]
    fn resolve_prefers_supplied_name() {
        let supplied = LocationName::resolve(Some("upper_basin")).unwrap();
        assert_eq!(supplied.as_str(), "upper_basin");

        let first = LocationName::resolve(None).unwrap();
        let second = LocationName::resolve(None).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn names_reject_separators_and_spaces() {
        assert!(LocationName::new("a/b").is_err());
        assert!(LocationName::new("with space").is_err());
        assert!(LocationName::new("").is_err());
        assert!(MapsetName::new("..").is_err());
        assert!(MapsetName::new("run-2.v1").is_ok());
    }

    #[test]
    fn default_mapset_is_permanent() {
        let mapset = MapsetName::default();
        assert!(mapset.is_permanent());
        assert_eq!(mapset.as_str(), "PERMANENT");
    }

    #[test]
    fn dbase_follows_platform_convention() {
        let home = Path::new("/home/hydro");
        assert_eq!(dbase_under(home, false), home.join("grassdata"));
        assert_eq!(
            dbase_under(home, true),
            home.join("Documents").join("grassdata")
        );
    }

    #[test]
    fn paths_join_dbase_location_and_mapset() {
        let paths = WorkspacePaths::new(
            PathBuf::from("/data/grassdata"),
            LocationName::new("basin").unwrap(),
            MapsetName::new("user1").unwrap(),
        );
        assert_eq!(paths.location_path(), PathBuf::from("/data/grassdata/basin"));
        assert_eq!(
            paths.mapset_path(),
            PathBuf::from("/data/grassdata/basin/user1")
        );
    }

    #[test]
    fn location_exists_once_permanent_is_present() {
        let temp = tempdir().unwrap();
        let paths = WorkspacePaths::new(
            temp.path().to_path_buf(),
            LocationName::new("basin").unwrap(),
            MapsetName::new("user1").unwrap(),
        );
        assert!(!paths.location_exists());

        fs::create_dir_all(temp.path().join("basin")).unwrap();
        assert!(!paths.location_exists());

        fs::create_dir_all(temp.path().join("basin").join(PERMANENT)).unwrap();
        assert!(paths.location_exists());
    }

    #[test]
    fn clean_removes_location_recursively() {
        let temp = tempdir().unwrap();
        let location = temp.path().join("basin");
        fs::create_dir_all(location.join("PERMANENT").join("cell")).unwrap();
        fs::write(location.join("PERMANENT").join("DEFAULT_WIND"), "proj: 99").unwrap();
        fs::write(location.join("PERMANENT").join("cell").join("dem"), "").unwrap();

        let removed = clean(&location).unwrap();
        assert_eq!(removed.files, 2);
        assert!(!location.exists());
    }

    #[test]
    fn clean_errors_for_missing_location() {
        let temp = tempdir().unwrap();
        let err = clean(&temp.path().join("absent")).expect_err("missing location");
        assert!(matches!(err, GrassError::Workspace(_)));
    }
}
