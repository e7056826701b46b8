//! # cmdforge
//!
//! Builds a command-line interface from declared handler signatures and routes
//! the parsed values back into handler invocations.
//!
//! Handlers live on [`Definition`]s. A definition may extend one or more base
//! definitions, and a handler that re-declares an inherited one can either
//! replace its signature outright or capture the inherited parameters through
//! `*args` / `**kwargs` style variadic markers.
//!
//! ## Pipeline
//!
//! 1. [`signature`] - declared parameter lists and their validation
//! 2. [`merge`] - the effective parameter list for a handler, walking its bases
//! 3. [`types`] - annotation to value-parser resolution
//! 4. [`synthesis`] - effective parameters to argument declarations
//! 5. [`registry`] - command discovery and the clap command tree
//! 6. [`dispatch`] - parse once, construct the instance, invoke the command
//!
//! ## Example
//!
//! ```ignore
//! use cmdforge::*;
//!
//! let base = Definition::builder("Driver")
//!     .constructor([Parameter::new("name")])
//!     .command("drive", [Parameter::new("something")])
//!     .build()?;
//!
//! let program = Program::new(base, |args| Ok(Driver::new(args.get::<String>("name")?)))
//!     .handler("drive", |driver, args| {
//!         driver.drive(&args.get::<String>("something")?);
//!         Ok(())
//!     });
//!
//! program.run_from(["drivers", "drive", "John", "car"])?;
//! ```

pub mod config;
pub mod dispatch;
pub mod error;
pub mod merge;
pub mod parameter;
pub mod registry;
pub mod signature;
pub mod synthesis;
pub mod types;

pub use config::CliSettings;
pub use dispatch::{CallArgs, Feed, ParsedArguments, Program};
pub use error::{
    DeclarationError, DispatchError, Error, ErrorSeverity, ParseError, Result, Severity,
};
pub use merge::{effective_params, merge_params};
pub use parameter::{ParamKind, Parameter};
pub use registry::{
    CliBuilder, CommandOptions, CommandSpec, CommandSurface, Definition, DefinitionBuilder,
    HandlerDecl, SynthesizedCli, CONSTRUCTOR,
};
pub use signature::ExtractSignature;
pub use synthesis::{ArgInput, ArgumentBuilder, ArgumentDecl, ArgumentSynthesizer, ClapArguments};
pub use types::{ArgMeta, ParseFailure, Resolution, TypeRef, TypeResolver, ValueParser};

// Handlers read parsed values as JSON values
pub use serde_json::Value;
