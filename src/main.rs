//! safeout - dependency-ordered dispatch of agent safe outputs

use std::process::ExitCode;

fn main() -> ExitCode {
    match safeout::cli::run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
