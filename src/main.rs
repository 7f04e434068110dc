use std::process::ExitCode;

fn main() -> ExitCode {
    strainwave_lib::run()
}
