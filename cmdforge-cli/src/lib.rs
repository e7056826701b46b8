//! # cmdforge-cli
//!
//! The `drivers` binary: a small driver hierarchy whose command line is
//! synthesized by cmdforge. Which trim is exposed is a configuration choice,
//! see [`config::DriversConfig`].

pub mod config;
pub mod drivers;
pub mod error;
pub mod exit_codes;
pub mod logging;

use cmdforge::{Error, ParseError};
use config::DriversConfig;
use error::{handle_cli_result, CliError};
use exit_codes::{EXIT_ERROR, EXIT_SUCCESS};
use std::ffi::OsString;

/// Synthesize the configured trim, run `argv` and return the exit code
pub fn run<I, S>(config: &DriversConfig, argv: I) -> i32
where
    I: IntoIterator<Item = S>,
    S: Into<OsString>,
{
    let program = match drivers::program(config.trim, config.settings()) {
        Ok(program) => program,
        Err(e) => return handle_cli_result::<()>(Err(CliError::from(e))),
    };

    match program.run_from(argv) {
        Ok(driver) => {
            tracing::debug!(driver = driver.name(), "done");
            EXIT_SUCCESS
        }
        Err(Error::Parse(ParseError::Cli(e))) => {
            // Help and version requests are normal exits; clap picks the stream
            let code = if e.use_stderr() { EXIT_ERROR } else { EXIT_SUCCESS };
            let _ = e.print();
            code
        }
        Err(e) => handle_cli_result::<()>(Err(CliError::from(e))),
    }
}
