use std::process::ExitCode;

fn main() -> ExitCode {
    match acbtally::cmd::command_main() {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => code,
    }
}
