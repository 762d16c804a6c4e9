use std::process::ExitCode;

fn main() -> ExitCode {
    cargolink_cli::run()
}
