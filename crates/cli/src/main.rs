use std::process::ExitCode;

fn main() -> ExitCode {
    estimaro_cli::run()
}
