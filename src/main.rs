use std::process::ExitCode;

fn main() -> ExitCode {
    gridpilot_lib::run()
}
