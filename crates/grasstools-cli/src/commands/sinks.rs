use std::path::PathBuf;

use clap::{Arg, ArgMatches, Command, value_parser};
use grasstools::pipeline::{require_dir, require_file};
use grasstools::{SinkParams, Sinks};

use crate::commands::CommandResult;
use crate::context::CliContext;
use crate::error::CliError;
use crate::util::{required_path, value};

pub fn command() -> Command {
    Command::new("sinks")
        .about("Create a sink mask and breach candidate polygons")
        .arg(
            Arg::new("infile")
                .value_name("INFILE")
                .required(true)
                .value_parser(value_parser!(PathBuf))
                .help("Elevation raster to import."),
        )
        .arg(
            Arg::new("dst")
                .value_name("DST")
                .required(true)
                .value_parser(value_parser!(PathBuf))
                .help("Existing directory receiving the outputs."),
        )
        .arg(
            Arg::new("min-depth")
                .long("min-depth")
                .default_value("0.2")
                .value_parser(value_parser!(f64))
                .help("Depth threshold below which sinks will be ignored."),
        )
        .arg(
            Arg::new("mask-depth")
                .long("mask-depth")
                .default_value("5.0")
                .value_parser(value_parser!(f64))
                .help("Depth above which sinks will be added to the sink mask."),
        )
        .arg(
            Arg::new("passes")
                .long("passes")
                .default_value("1")
                .value_parser(value_parser!(u32).range(1..))
                .help("Number of passes to fill depressions."),
        )
}

pub fn run(context: &CliContext, matches: &ArgMatches) -> Result<CommandResult, CliError> {
    let infile = required_path(matches, "infile")?;
    let dst = required_path(matches, "dst")?;
    require_file(&infile)?;
    require_dir(&dst)?;

    let params = SinkParams {
        min_depth: value(matches, "min-depth")?,
        mask_depth: value(matches, "mask-depth")?,
        passes: value(matches, "passes")?,
    };
    let pipeline = Sinks::new(infile, params)?;
    context.run_pipeline(&pipeline, &dst)
}
