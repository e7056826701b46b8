//! Error types for command synthesis and dispatch
//!
//! Errors fall into three groups that match the stage that raises them:
//!
//! - [`DeclarationError`]: the declared definitions cannot be turned into a CLI.
//!   Raised while building, before any input is parsed.
//! - [`ParseError`]: the input does not match the synthesized CLI.
//! - [`DispatchError`]: a parsed value could not be handed to a handler, or the
//!   handler itself failed.
//!
//! Nothing is recovered or defaulted on failure; callers abort the run.

use thiserror::Error;

/// Severity levels for error classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Potential issue but the run can proceed
    Warning,
    /// The run failed on its input or a handler
    Error,
    /// The declarations themselves are broken
    Critical,
}

/// Trait for error types that have severity levels
pub trait Severity {
    /// Get the severity level of this error
    fn severity(&self) -> ErrorSeverity;
}

/// Boxed error returned by user handlers and constructors
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type alias for cmdforge operations
pub type Result<T> = std::result::Result<T, Error>;

/// Declarations that cannot be synthesized into a CLI
#[derive(Debug, Error)]
pub enum DeclarationError {
    #[error("argument '{name}' of command '{command}' conflicts with an existing argument")]
    DuplicateArgument { command: String, name: String },

    #[error("argument '{name}' is not ignorable as it has no default value")]
    NotIgnorable { name: String },

    #[error("no parser for type {type_name} (parameter '{parameter}')")]
    NoParser { type_name: String, parameter: String },

    #[error("default command '{name}' is not one of the discovered commands: {available:?}")]
    UnknownDefaultCommand { name: String, available: Vec<String> },

    #[error(
        "bases of '{definition}' disagree on parameter '{parameter}' of '{handler}': {first} vs {second}"
    )]
    BaseConflict {
        definition: String,
        handler: String,
        parameter: String,
        first: String,
        second: String,
    },

    #[error("invalid signature for '{handler}': {reason}")]
    InvalidSignature { handler: String, reason: String },

    #[error("command '{command}' has no bound handler")]
    UnboundCommand { command: String },
}

/// Input rejected by the token parser
#[derive(Debug, Error)]
pub enum ParseError {
    /// Missing positionals, unknown options and rejected values all surface here.
    /// A value that fails every member of a union carries every member's reason.
    #[error(transparent)]
    Cli(#[from] clap::Error),
}

impl ParseError {
    /// Whether this is an explicit help or version request rather than a failure
    ///
    /// A command line without a command also prints help, but it is still a
    /// missing required command and counts as a failure.
    pub fn is_informational(&self) -> bool {
        use clap::error::ErrorKind;
        match self {
            ParseError::Cli(e) => {
                matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion)
            }
        }
    }
}

/// Failures while handing parsed values to handlers
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("no value for parameter '{name}'")]
    MissingValue { name: String },

    #[error("value for parameter '{name}' has the wrong shape: {source}")]
    InvalidValue {
        name: String,
        source: serde_json::Error,
    },

    #[error("unknown command '{name}'")]
    UnknownCommand { name: String },

    #[error("'{handler}' failed: {source}")]
    Handler {
        handler: String,
        source: HandlerError,
    },
}

/// Any failure of a synthesize, parse and dispatch run
#[derive(Debug, Error)]
pub enum Error {
    #[error("declaration error: {0}")]
    Declaration(#[from] DeclarationError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("dispatch error: {0}")]
    Dispatch(#[from] DispatchError),
}

impl Severity for DeclarationError {
    fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::Critical
    }
}

impl Severity for ParseError {
    fn severity(&self) -> ErrorSeverity {
        if self.is_informational() {
            ErrorSeverity::Warning
        } else {
            ErrorSeverity::Error
        }
    }
}

impl Severity for DispatchError {
    fn severity(&self) -> ErrorSeverity {
        match self {
            DispatchError::UnknownCommand { .. } => ErrorSeverity::Critical,
            DispatchError::MissingValue { .. }
            | DispatchError::InvalidValue { .. }
            | DispatchError::Handler { .. } => ErrorSeverity::Error,
        }
    }
}

impl Severity for Error {
    fn severity(&self) -> ErrorSeverity {
        match self {
            Error::Declaration(e) => e.severity(),
            Error::Parse(e) => e.severity(),
            Error::Dispatch(e) => e.severity(),
        }
    }
}
