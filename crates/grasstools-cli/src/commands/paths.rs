use std::path::PathBuf;

use clap::{Arg, ArgMatches, Command, value_parser};
use grasstools::pipeline::{require_dir, require_file};
use grasstools::{PathParams, Paths};

use crate::commands::CommandResult;
use crate::context::CliContext;
use crate::error::CliError;
use crate::util::{required_path, value};

pub fn command() -> Command {
    Command::new("paths")
        .about("Trace flow paths downslope from channel head points")
        .arg(
            Arg::new("infile")
                .value_name("INFILE")
                .required(true)
                .value_parser(value_parser!(PathBuf))
                .help("Elevation raster to import."),
        )
        .arg(
            Arg::new("headfile")
                .value_name("HEADFILE")
                .required(true)
                .value_parser(value_parser!(PathBuf))
                .help("Vector file of channel head points."),
        )
        .arg(
            Arg::new("dst")
                .value_name("DST")
                .required(true)
                .value_parser(value_parser!(PathBuf))
                .help("Existing directory receiving the outputs."),
        )
        .arg(
            Arg::new("threshold")
                .long("threshold")
                .default_value("5000")
                .value_parser(value_parser!(u64))
                .help("r.watershed threshold parameter"),
        )
}

pub fn run(context: &CliContext, matches: &ArgMatches) -> Result<CommandResult, CliError> {
    let infile = required_path(matches, "infile")?;
    let headfile = required_path(matches, "headfile")?;
    let dst = required_path(matches, "dst")?;
    require_file(&infile)?;
    require_file(&headfile)?;
    require_dir(&dst)?;

    let params = PathParams {
        threshold: value(matches, "threshold")?,
    };
    let pipeline = Paths::new(infile, headfile, params)?;
    context.run_pipeline(&pipeline, &dst)
}
