use std::path::PathBuf;

use clap::{Arg, ArgMatches, Command, value_parser};
use grasstools::pipeline::{require_dir, require_file};
use grasstools::{Hydrolines, HydrolinesParams};

use crate::commands::CommandResult;
use crate::context::CliContext;
use crate::error::CliError;
use crate::util::{required_path, value};

pub fn command() -> Command {
    Command::new("hydrolines")
        .about("Create stream centerlines, Strahler order, basins and height above stream")
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
                .help("Existing directory receiving the GeoTIFF and Shapefile outputs."),
        )
        .arg(
            Arg::new("mod")
                .long("mod")
                .default_value("10")
                .value_parser(value_parser!(u32))
                .help("r.hydrodem mod parameter"),
        )
        .arg(
            Arg::new("size")
                .long("size")
                .default_value("40")
                .value_parser(value_parser!(u32))
                .help("r.hydrodem size parameter"),
        )
        .arg(
            Arg::new("threshold")
                .long("threshold")
                .default_value("5000")
                .value_parser(value_parser!(u64))
                .help("r.watershed threshold parameter"),
        )
        .arg(
            Arg::new("d8cut")
                .long("d8cut")
                .default_value("1000000")
                .value_parser(value_parser!(f64))
                .help("r.stream.extract d8cut parameter"),
        )
        .arg(
            Arg::new("mexp")
                .long("mexp")
                .default_value("1.2")
                .value_parser(value_parser!(f64))
                .help("r.stream.extract mexp parameter"),
        )
        .arg(
            Arg::new("stream-length")
                .long("stream-length")
                .default_value("100")
                .value_parser(value_parser!(u32))
                .help("r.stream.extract stream_length parameter"),
        )
}

pub fn run(context: &CliContext, matches: &ArgMatches) -> Result<CommandResult, CliError> {
    let infile = required_path(matches, "infile")?;
    let dst = required_path(matches, "dst")?;
    require_file(&infile)?;
    require_dir(&dst)?;

    let params = HydrolinesParams {
        mod_cells: value(matches, "mod")?,
        size: value(matches, "size")?,
        threshold: value(matches, "threshold")?,
        d8cut: value(matches, "d8cut")?,
        mexp: value(matches, "mexp")?,
        stream_length: value(matches, "stream-length")?,
    };
    let pipeline = Hydrolines::new(infile, params)?;
    context.run_pipeline(&pipeline, &dst)
}
