use std::path::PathBuf;

use clap::ArgMatches;

use crate::error::{CliError, ExitStatus};

#[derive(Clone, Copy, Debug, Default)]
pub struct Verbosity {
    pub json: bool,
    pub verbose: bool,
}

/// Accepts `26918`, `epsg:26918` or `EPSG:26918`.
pub fn parse_epsg(value: &str) -> Result<u32, String> {
    let trimmed = value.trim();
    let code = trimmed
        .strip_prefix("epsg:")
        .or_else(|| trimmed.strip_prefix("EPSG:"))
        .unwrap_or(trimmed);
    match code.parse::<u32>() {
        Ok(0) | Err(_) => Err(format!("'{value}' is not an EPSG code")),
        Ok(code) => Ok(code),
    }
}

pub fn required_path(matches: &ArgMatches, name: &str) -> Result<PathBuf, CliError> {
    matches
        .get_one::<PathBuf>(name)
        .cloned()
        .ok_or_else(|| CliError::new(format!("missing <{name}> argument"), ExitStatus::Usage))
}

pub fn value<T: Clone + Send + Sync + 'static>(
    matches: &ArgMatches,
    name: &str,
) -> Result<T, CliError> {
    matches
        .get_one::<T>(name)
        .cloned()
        .ok_or_else(|| CliError::new(format!("missing --{name} value"), ExitStatus::Usage))
}
