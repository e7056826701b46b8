//! Argument synthesis
//!
//! Turns an effective parameter list into argument declarations and feeds
//! them to an [`ArgumentBuilder`]. Parameters without a default become
//! positionals named after the parameter; parameters with a default, and
//! flags, become `--options` with underscores rendered as hyphens. Ignored
//! parameters and variadic markers produce nothing.

use crate::error::DeclarationError;
use crate::parameter::Parameter;
use crate::types::{TypeResolver, ValueParser};
use clap::{Arg, ArgAction, ArgMatches, Command};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::{Mutex, OnceLock, PoisonError};
use tracing::trace;

/// Destination of the built-in `--print-args` flag
pub const PRINT_ARGS: &str = "print_args";

/// Destination of the chosen command name
pub const COMMAND_KEY: &str = "command";

/// How an argument takes its value
#[derive(Debug, Clone, PartialEq)]
pub enum ArgInput {
    /// One value token, converted by the parser
    Value(ValueParser),
    /// No value token; presence sets `true`
    Presence,
}

/// Parser-agnostic description of one command-line argument
#[derive(Debug, Clone, PartialEq)]
pub struct ArgumentDecl {
    /// Destination name, the parameter name
    pub name: String,
    /// `something` for positionals, `--hidden-option` for options
    pub cli_name: String,
    pub is_positional: bool,
    pub input: ArgInput,
    pub default: Option<Value>,
    pub hidden: bool,
    pub help: Option<String>,
}

impl ArgumentDecl {
    pub fn option_name(name: &str) -> String {
        format!("--{}", name.replace('_', "-"))
    }

    /// The `--print-args` flag every command carries
    pub fn print_args() -> Self {
        Self {
            name: PRINT_ARGS.to_string(),
            cli_name: Self::option_name(PRINT_ARGS),
            is_positional: false,
            input: ArgInput::Presence,
            default: Some(Value::Bool(false)),
            hidden: false,
            help: Some("Print the resolved arguments before running the command".to_string()),
        }
    }

    /// The clap argument for this declaration
    pub fn to_clap(&self) -> Arg {
        let mut arg = Arg::new(intern(&self.name)).hide(self.hidden);

        if let Some(long) = self.cli_name.strip_prefix("--") {
            arg = arg.long(intern(long));
        }

        arg = match &self.input {
            ArgInput::Presence => arg.action(ArgAction::SetTrue),
            ArgInput::Value(parser) => {
                let parser = parser.clone();
                arg.action(ArgAction::Set)
                    .value_parser(move |text: &str| parser.parse(text))
            }
        };

        if self.is_positional {
            arg = arg.required(true);
        }

        let default = match (&self.input, &self.default) {
            (ArgInput::Value(_), Some(default)) => Some(format!("[default: {}]", display_value(default))),
            _ => None,
        };
        match (&self.help, default) {
            (Some(help), Some(default)) => arg.help(format!("{help} {default}")),
            (Some(help), None) => arg.help(help.clone()),
            (None, Some(default)) => arg.help(default),
            (None, None) => arg,
        }
    }

    /// The parsed value, falling back to the declared default
    pub fn read(&self, matches: &ArgMatches) -> Option<Value> {
        match self.input {
            ArgInput::Presence => match matches.try_get_one::<bool>(&self.name) {
                Ok(Some(true)) => Some(Value::Bool(true)),
                _ => self.default.clone(),
            },
            ArgInput::Value(_) => matches
                .try_get_one::<Value>(&self.name)
                .ok()
                .flatten()
                .cloned()
                .or_else(|| self.default.clone()),
        }
    }
}

/// Render a value the way it is shown to users
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Receives argument declarations for one command
///
/// Registered names are append-only for the lifetime of the builder.
pub trait ArgumentBuilder {
    /// Name of the command being built, for error messages
    fn command_name(&self) -> &str;

    /// Whether `name` is already taken in this command's argument set
    fn contains(&self, name: &str) -> bool;

    fn add_argument(&mut self, decl: ArgumentDecl);
}

/// Builds a clap subcommand from argument declarations
#[derive(Debug, Default)]
pub struct ClapArguments {
    name: String,
    command: Command,
    decls: Vec<ArgumentDecl>,
    reserved: HashSet<String>,
}

impl ClapArguments {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            command: Command::new(intern(name)).infer_long_args(true),
            decls: Vec::new(),
            reserved: HashSet::new(),
        }
    }

    /// Claim a name without declaring an argument for it
    pub fn reserve(mut self, name: &str) -> Self {
        self.reserved.insert(name.to_string());
        self
    }

    pub fn about(mut self, about: impl Into<String>) -> Self {
        self.command = self.command.about(about.into());
        self
    }

    pub fn decls(&self) -> &[ArgumentDecl] {
        &self.decls
    }

    pub fn into_parts(self) -> (Command, Vec<ArgumentDecl>) {
        (self.command, self.decls)
    }
}

impl ArgumentBuilder for ClapArguments {
    fn command_name(&self) -> &str {
        &self.name
    }

    fn contains(&self, name: &str) -> bool {
        self.reserved.contains(name) || self.decls.iter().any(|d| d.name == name)
    }

    fn add_argument(&mut self, decl: ArgumentDecl) {
        let command = std::mem::take(&mut self.command);
        self.command = command.arg(decl.to_clap());
        self.decls.push(decl);
    }
}

/// Emits argument declarations for effective parameter lists
#[derive(Debug, Clone, Copy)]
pub struct ArgumentSynthesizer<'a> {
    resolver: &'a TypeResolver,
}

impl<'a> ArgumentSynthesizer<'a> {
    pub fn new(resolver: &'a TypeResolver) -> Self {
        Self { resolver }
    }

    /// The declaration for one parameter, or `None` when it stays off the
    /// command line
    pub fn declare(&self, param: &Parameter) -> Result<Option<ArgumentDecl>, DeclarationError> {
        if param.kind.is_variadic() {
            trace!(parameter = %param.name, "skipping variadic marker");
            return Ok(None);
        }

        let resolution = self.resolver.resolve(param)?;
        if resolution.ignorable {
            trace!(parameter = %param.name, "ignored on the command line");
            return Ok(None);
        }

        let is_option = param.has_default() || resolution.is_flag;
        let cli_name = if is_option {
            ArgumentDecl::option_name(&param.name)
        } else {
            param.name.clone()
        };

        let (input, default) = match resolution.parser {
            Some(parser) => (ArgInput::Value(parser), param.default.clone()),
            None => (
                ArgInput::Presence,
                Some(param.default.clone().unwrap_or(Value::Bool(false))),
            ),
        };

        Ok(Some(ArgumentDecl {
            name: param.name.clone(),
            cli_name,
            is_positional: !is_option,
            input,
            default,
            hidden: resolution.meta.hidden,
            help: resolution.meta.help,
        }))
    }

    /// Register one declaration, rejecting a name the command already uses
    pub fn register(
        &self,
        builder: &mut dyn ArgumentBuilder,
        decl: ArgumentDecl,
    ) -> Result<(), DeclarationError> {
        if builder.contains(&decl.name) {
            return Err(DeclarationError::DuplicateArgument {
                command: builder.command_name().to_string(),
                name: decl.name,
            });
        }
        trace!(command = builder.command_name(), argument = %decl.cli_name, "adding argument");
        builder.add_argument(decl);
        Ok(())
    }

    /// Declare every eligible parameter in order
    pub fn synthesize(
        &self,
        params: &[Parameter],
        builder: &mut dyn ArgumentBuilder,
    ) -> Result<Vec<ArgumentDecl>, DeclarationError> {
        let mut emitted = Vec::new();
        for param in params {
            if !param.kind.is_variadic() && builder.contains(&param.name) {
                return Err(DeclarationError::DuplicateArgument {
                    command: builder.command_name().to_string(),
                    name: param.name.clone(),
                });
            }
            if let Some(decl) = self.declare(param)? {
                self.register(builder, decl.clone())?;
                emitted.push(decl);
            }
        }
        Ok(emitted)
    }
}

/// Leak a string once for clap's `'static` ids; repeated names share storage
pub(crate) fn intern(value: &str) -> &'static str {
    static INTERNED: OnceLock<Mutex<HashSet<&'static str>>> = OnceLock::new();

    let mut interned = INTERNED
        .get_or_init(Default::default)
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    if let Some(existing) = interned.get(value) {
        return existing;
    }
    let leaked: &'static str = Box::leak(value.to_owned().into_boxed_str());
    interned.insert(leaked);
    leaked
}
