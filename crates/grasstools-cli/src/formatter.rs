use std::process::ExitCode;

use crate::commands::CommandResult;
use crate::error::CliError;

pub enum OutputFormat {
    Text,
    Json,
}

/// Renders a `CommandResult` as human-readable text or a single JSON line and
/// converts it into the process exit code.
pub fn emit_result(result: CommandResult, format: OutputFormat) -> Result<ExitCode, CliError> {
    match format {
        OutputFormat::Text => print_text(&result),
        OutputFormat::Json => print_json(&result)?,
    };
    Ok(ExitCode::from(result.exit_status().code()))
}

fn print_text(result: &CommandResult) {
    match result {
        CommandResult::PipelineCompleted {
            pipeline,
            layer,
            location,
            mapset,
            created,
            outputs,
            elapsed,
        } => {
            if *created {
                println!("Created location {location} (mapset {mapset})");
            } else {
                println!("Used location {location} (mapset {mapset})");
            }
            println!("GRASS layer: {layer}");
            print_outputs(outputs);
            println!("Finished {pipeline} in: {elapsed}");
        }
        CommandResult::PipelinePlanned {
            pipeline,
            location,
            mapset,
            commands,
            outputs,
        } => {
            if mapset.is_empty() {
                println!("Dry run: {pipeline} would touch {location}");
            } else {
                println!(
                    "Dry run: {pipeline} would run {} commands in location {location} (mapset {mapset})",
                    commands.len()
                );
            }
            for command in commands {
                println!("  {command}");
            }
            if !outputs.is_empty() {
                print_outputs(outputs);
            }
        }
        CommandResult::LocationRemoved { path, files } => {
            println!("Removed location {path} ({files} files)");
        }
    }
}

fn print_outputs(outputs: &[String]) {
    println!("Outputs ({}):", outputs.len());
    for output in outputs {
        println!("  - {output}");
    }
}

fn print_json(result: &CommandResult) -> Result<(), CliError> {
    println!("{}", serde_json::to_string(result)?);
    Ok(())
}
