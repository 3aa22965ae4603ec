use std::process::ExitCode;

fn main() -> ExitCode {
    grasstools_cli::run()
}
