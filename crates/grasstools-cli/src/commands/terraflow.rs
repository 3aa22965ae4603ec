use std::path::PathBuf;

use clap::{Arg, ArgMatches, Command, value_parser};
use grasstools::pipeline::{require_dir, require_file};
use grasstools::{Terraflow, TerraflowParams};

use crate::commands::CommandResult;
use crate::context::CliContext;
use crate::error::CliError;
use crate::util::{required_path, value};

pub fn command() -> Command {
    Command::new("terraflow")
        .about("Create first order raster hydrography products including basins")
        .long_about(
            "Create first order raster hydrography products including basins.\n\n\
             Writes <name>_outlets.tif, <name>_fac.tif, <name>_fdr.tif and \
             <name>_basins.tif, where <name> is the imported DEM layer.",
        )
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
            Arg::new("threshold")
                .long("threshold")
                .default_value("1500")
                .value_parser(value_parser!(u64))
                .help("r.watershed threshold parameter"),
        )
}

pub fn run(context: &CliContext, matches: &ArgMatches) -> Result<CommandResult, CliError> {
    let infile = required_path(matches, "infile")?;
    let dst = required_path(matches, "dst")?;
    require_file(&infile)?;
    require_dir(&dst)?;

    let params = TerraflowParams {
        threshold: value(matches, "threshold")?,
    };
    let pipeline = Terraflow::new(infile, params)?;
    context.run_pipeline(&pipeline, &dst)
}
