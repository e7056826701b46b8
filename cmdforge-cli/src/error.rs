//! Error reporting for the drivers binary
//!
//! Library errors are turned into a [`CliError`] that keeps the original error
//! as its source and carries the exit code its severity maps to.

use std::error::Error;
use std::fmt;

use crate::exit_codes::{EXIT_ERROR, EXIT_SUCCESS, EXIT_WARNING};
use cmdforge::{ErrorSeverity, Severity};

/// CLI-specific result type that preserves error information
pub type CliResult<T> = Result<T, CliError>;

/// CLI error type that includes both error information and suggested exit code
#[derive(Debug)]
pub struct CliError {
    pub message: String,
    pub exit_code: i32,
    pub source: Option<Box<dyn Error + Send + Sync>>,
}

impl CliError {
    pub fn new(message: impl Into<String>, exit_code: i32) -> Self {
        Self {
            message: message.into(),
            exit_code,
            source: None,
        }
    }

    /// Get the full error chain as a formatted string
    pub fn full_chain(&self) -> String {
        let mut result = self.message.clone();

        let mut current_source = self.source();
        while let Some(err) = current_source {
            result.push_str(&format!("\n  Caused by: {err}"));
            current_source = err.source();
        }

        result
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Error for CliError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn Error + 'static))
    }
}

pub fn exit_code_for(severity: ErrorSeverity) -> i32 {
    match severity {
        ErrorSeverity::Warning => EXIT_WARNING,
        ErrorSeverity::Error | ErrorSeverity::Critical => EXIT_ERROR,
    }
}

impl From<cmdforge::Error> for CliError {
    fn from(error: cmdforge::Error) -> Self {
        let message = match &error {
            cmdforge::Error::Declaration(_) => "the command line could not be built",
            cmdforge::Error::Parse(_) => "could not parse the command line",
            cmdforge::Error::Dispatch(_) => "the command failed",
        };
        Self {
            message: message.to_string(),
            exit_code: exit_code_for(error.severity()),
            source: Some(Box::new(error)),
        }
    }
}

impl From<cmdforge::DeclarationError> for CliError {
    fn from(error: cmdforge::DeclarationError) -> Self {
        cmdforge::Error::from(error).into()
    }
}

/// Convert a CliResult to an exit code, logging the full error chain if needed
pub fn handle_cli_result<T>(result: CliResult<T>) -> i32 {
    match result {
        Ok(_) => EXIT_SUCCESS,
        Err(e) => {
            tracing::error!(exit_code = e.exit_code, "Error: {}", e.full_chain());
            e.exit_code
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cmdforge::DispatchError;

    #[test]
    fn test_full_chain_includes_sources() {
        let error = CliError::from(cmdforge::Error::from(DispatchError::Handler {
            handler: "drive".to_string(),
            source: "flat tire".into(),
        }));
        assert_eq!(error.exit_code, EXIT_ERROR);
        let chain = error.full_chain();
        assert!(chain.starts_with("the command failed"));
        assert!(chain.contains("Caused by: dispatch error: 'drive' failed: flat tire"));
        assert!(chain.contains("Caused by: flat tire"));
    }

    #[test]
    fn test_plain_error_exit_code() {
        let error = CliError::new("nothing to do", EXIT_WARNING);
        assert_eq!(handle_cli_result::<()>(Err(error)), EXIT_WARNING);
        assert_eq!(handle_cli_result(Ok(())), EXIT_SUCCESS);
    }
}
