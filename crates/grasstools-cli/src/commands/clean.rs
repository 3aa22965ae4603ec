use clap::{ArgMatches, Command};
use grasstools::{LocationName, clean};

use crate::commands::CommandResult;
use crate::context::CliContext;
use crate::error::{CliError, ExitStatus};

pub fn command() -> Command {
    Command::new("clean").about("Remove the --location directory and everything in it")
}

pub fn run(context: &CliContext, _matches: &ArgMatches) -> Result<CommandResult, CliError> {
    let name = context.location.as_deref().ok_or_else(|| {
        CliError::new("clean requires --location <NAME>", ExitStatus::Usage)
    })?;
    let location = LocationName::new(name)?;
    let path = context.dbase.join(location.as_str());

    if context.dry_run {
        return Ok(CommandResult::PipelinePlanned {
            pipeline: "clean".into(),
            location: path.display().to_string(),
            mapset: String::new(),
            commands: vec![format!("rm -r {}", path.display())],
            outputs: Vec::new(),
        });
    }

    let removed = clean(&path)?;
    Ok(CommandResult::LocationRemoved {
        path: removed.path.display().to_string(),
        files: removed.files,
    })
}
