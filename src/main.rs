use clap::Parser;
use ghaw::cli::{commands, Args};
use std::process::ExitCode;

fn main() -> ExitCode {
    let args = Args::parse();

    let _guard = match ghaw::logging::init(&args.command) {
        Ok(guard) => guard,
        Err(err) => {
            eprintln!("error: {:#}", err);
            return ExitCode::from(2);
        }
    };

    match commands::execute(&args.command) {
        Ok(summary) if summary.success() => ExitCode::SUCCESS,
        Ok(_) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("error: {:#}", err);
            ExitCode::from(2)
        }
    }
}
