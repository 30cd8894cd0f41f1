//! Entry point for the finddupes CLI.

use clap::Parser;
use finddupes::{
    cli::Cli,
    duplicates::FinderError,
    error::ExitCode,
    logging::init_logging,
};

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    match finddupes::run_app(cli) {
        Ok(code) => code.into(),
        Err(err) => {
            let code = if err
                .downcast_ref::<FinderError>()
                .is_some_and(|e| matches!(e, FinderError::Interrupted))
            {
                ExitCode::Interrupted
            } else {
                ExitCode::GeneralError
            };

            eprintln!("Error: {err:#}");
            code.into()
        }
    }
}
