use std::ffi::OsString;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Arg, ArgAction, ArgMatches, Command, value_parser};
use grasstools::Settings;
use tracing_subscriber::EnvFilter;

use crate::commands;
use crate::context::CliContext;
use crate::error::{CliError, ExitStatus};
use crate::formatter::{OutputFormat, emit_result};
use crate::util::{Verbosity, parse_epsg};

const NAME: &str = "grasstool";

pub fn run() -> ExitCode {
    match run_cli(std::env::args()) {
        Ok(code) => code,
        Err(err) => {
            err.print();
            err.exit_code()
        }
    }
}

/// Parses CLI arguments, resolves the global options and dispatches to the
/// subcommand. Returns a `sysexits`-compatible `ExitCode`.
pub fn run_cli<I, S>(args: I) -> Result<ExitCode, CliError>
where
    I: IntoIterator<Item = S>,
    S: Into<OsString> + Clone,
{
    let command = build_cli();
    let matches = command.try_get_matches_from(args)?;

    let verbosity = Verbosity {
        json: matches.get_flag("json"),
        verbose: matches.get_flag("verbose"),
    };
    init_tracing(verbosity.verbose);
    let output = if verbosity.json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };

    let overrides = Settings {
        gisbase: matches.get_one::<PathBuf>("gisbase").cloned(),
        grass: matches.get_one::<String>("grass").cloned(),
        dbase: matches.get_one::<PathBuf>("dbase").cloned(),
        mapset: matches.get_one::<String>("mapset").cloned(),
    };
    let context = CliContext::bootstrap(
        matches.get_one::<PathBuf>("config").map(PathBuf::as_path),
        overrides,
        matches.get_one::<String>("location").cloned(),
        matches.get_one::<u32>("epsg").copied(),
        matches.get_flag("dry-run"),
        verbosity,
    )?;
    if context.verbosity.verbose {
        tracing::info!(
            dbase = %context.dbase.display(),
            location = context.location.as_deref().unwrap_or("<generated>"),
            mapset = context.settings.mapset.as_deref().unwrap_or(grasstools::PERMANENT),
            "resolved workspace options"
        );
    }

    let result = dispatch(&context, &matches)?;
    emit_result(result, output)
}

/// `RUST_LOG` wins; otherwise `--verbose` shows step progress.
fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "info" } else { "error" }));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

/// Root command: workspace options shared by every pipeline, then one
/// subcommand per pipeline.
fn build_cli() -> Command {
    Command::new(NAME)
        .about("GRASS GIS pipelines for hydrologic flowline mapping")
        .version(env!("CARGO_PKG_VERSION"))
        .arg(
            Arg::new("dbase")
                .long("dbase")
                .value_name("DIR")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("GIS database directory. Defaults to ~/grassdata (~/Documents/grassdata on Windows)."),
        )
        .arg(
            Arg::new("location")
                .long("location")
                .value_name("NAME")
                .global(true)
                .help("Location to create or reuse. A unique name is generated when omitted."),
        )
        .arg(
            Arg::new("mapset")
                .long("mapset")
                .value_name("NAME")
                .global(true)
                .help("Mapset to work in. Defaults to PERMANENT."),
        )
        .arg(
            Arg::new("epsg")
                .long("epsg")
                .value_name("CODE")
                .global(true)
                .value_parser(parse_epsg)
                .help("Create the location from an EPSG code instead of the input raster."),
        )
        .arg(
            Arg::new("gisbase")
                .long("gisbase")
                .value_name("DIR")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("GRASS installation directory. Defaults to $GISBASE."),
        )
        .arg(
            Arg::new("grass")
                .long("grass")
                .value_name("EXE")
                .global(true)
                .help("GRASS startup executable, as a name inside GISBASE or a path."),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("FILE")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("YAML settings file. Defaults to ./grasstool.yaml when present."),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit a JSON result instead of human-readable text."),
        )
        .arg(
            Arg::new("dry-run")
                .long("dry-run")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Print the commands that would run without creating a location."),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Enables verbose mode"),
        )
        .subcommand_required(true)
        .subcommand(commands::hydrolines::command())
        .subcommand(commands::paths::command())
        .subcommand(commands::sinks::command())
        .subcommand(commands::terraflow::command())
        .subcommand(commands::clean::command())
}

fn dispatch(context: &CliContext, matches: &ArgMatches) -> Result<commands::CommandResult, CliError> {
    match matches.subcommand() {
        Some(("hydrolines", sub)) => commands::hydrolines::run(context, sub),
        Some(("paths", sub)) => commands::paths::run(context, sub),
        Some(("sinks", sub)) => commands::sinks::run(context, sub),
        Some(("terraflow", sub)) => commands::terraflow::run(context, sub),
        Some(("clean", sub)) => commands::clean::run(context, sub),
        _ => Err(CliError::new("missing command", ExitStatus::Usage)),
    }
}
