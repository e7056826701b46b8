//! Parse, construct and invoke
//!
//! [`Program`] binds a [`Definition`] to concrete code: a constructor that
//! builds the instance from the constructor arguments, and one handler per
//! command. A run parses the command line once, constructs the instance from
//! the constructor's effective parameters and invokes the chosen command with
//! its own effective parameters.

use crate::config::CliSettings;
use crate::error::{DeclarationError, DispatchError, HandlerError, Result};
use crate::merge::effective_params;
use crate::parameter::Parameter;
use crate::registry::{CliBuilder, Definition, SynthesizedCli, CONSTRUCTOR};
use crate::synthesis::{display_value, COMMAND_KEY, PRINT_ARGS};
use crate::types::TypeResolver;
use comfy_table::{presets::UTF8_FULL, Cell, CellAlignment, Table};
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::ffi::OsString;
use std::sync::Arc;
use tracing::{debug, info};

/// The result of one successful parse
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedArguments {
    command: String,
    values: BTreeMap<String, Value>,
}

impl ParsedArguments {
    pub fn new(command: impl Into<String>, values: BTreeMap<String, Value>) -> Self {
        Self {
            command: command.into(),
            values,
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn values(&self) -> &BTreeMap<String, Value> {
        &self.values
    }

    /// Whether `--print-args` was given
    pub fn print_args(&self) -> bool {
        matches!(self.values.get(PRINT_ARGS), Some(Value::Bool(true)))
    }

    /// Every value, the command name included, as a boxed listing sorted by key
    pub fn render(&self) -> String {
        let mut lines: Vec<(&str, String)> = self
            .values
            .iter()
            .map(|(key, value)| (key.as_str(), display_value(value)))
            .collect();
        lines.push((COMMAND_KEY, self.command.clone()));
        lines.sort_by(|a, b| a.0.cmp(b.0));

        let body: Vec<String> = lines
            .into_iter()
            .map(|(key, value)| format!("{key}: {value}"))
            .collect();

        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_header(vec![Cell::new("Arguments").set_alignment(CellAlignment::Center)]);
        table.add_row(vec![Cell::new(body.join("\n"))]);
        table.to_string()
    }
}

/// Values offered to a handler, before filtering by its signature
///
/// Per parameter the first source that has a value wins: overrides, then the
/// offered values (looked up under the renamed key when a rename exists).
/// Parameters with neither fall back to their declared default when read
/// through [`CallArgs`].
#[derive(Debug, Clone, Default)]
pub struct Feed {
    values: BTreeMap<String, Value>,
    overrides: BTreeMap<String, Value>,
    renames: HashMap<String, String>,
}

impl Feed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_parsed(parsed: &ParsedArguments) -> Self {
        Self {
            values: parsed.values.clone(),
            ..Self::default()
        }
    }

    pub fn value(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    /// A value that wins over anything parsed
    pub fn override_value(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.overrides.insert(name.into(), value.into());
        self
    }

    /// Read `param` from the offered value stored under `key`
    pub fn rename(mut self, param: impl Into<String>, key: impl Into<String>) -> Self {
        self.renames.insert(param.into(), key.into());
        self
    }

    /// Keep only what `params` accepts
    pub fn call_args(&self, params: &[Parameter]) -> CallArgs {
        let params: Vec<Parameter> = params
            .iter()
            .filter(|p| !p.kind.is_variadic())
            .cloned()
            .collect();

        let mut supplied = IndexMap::new();
        for param in &params {
            let key = self.renames.get(&param.name).unwrap_or(&param.name);
            let value = self
                .overrides
                .get(&param.name)
                .or_else(|| self.values.get(key));
            if let Some(value) = value {
                supplied.insert(param.name.clone(), value.clone());
            }
        }

        CallArgs {
            supplied,
            params,
        }
    }
}

/// Arguments for one handler call, in signature order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallArgs {
    supplied: IndexMap<String, Value>,
    params: Vec<Parameter>,
}

impl CallArgs {
    /// The supplied value, else the declared default
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.supplied.get(name).or_else(|| {
            self.params
                .iter()
                .find(|p| p.name == name)
                .and_then(|p| p.default.as_ref())
        })
    }

    /// Deserialize the value of `name`
    pub fn get<T: DeserializeOwned>(&self, name: &str) -> std::result::Result<T, DispatchError> {
        let value = self.value(name).ok_or_else(|| DispatchError::MissingValue {
            name: name.to_string(),
        })?;
        serde_json::from_value(value.clone()).map_err(|source| DispatchError::InvalidValue {
            name: name.to_string(),
            source,
        })
    }

    /// Whether a value was supplied rather than defaulted
    pub fn contains(&self, name: &str) -> bool {
        self.supplied.contains_key(name)
    }

    pub fn supplied(&self) -> &IndexMap<String, Value> {
        &self.supplied
    }

    /// Supplied values of positional-capable parameters, in order
    pub fn positional(&self) -> Vec<&Value> {
        self.params
            .iter()
            .filter(|p| p.kind.is_positional())
            .filter_map(|p| self.supplied.get(&p.name))
            .collect()
    }

    /// Supplied values of keyword-only parameters
    pub fn keywords(&self) -> Vec<(&str, &Value)> {
        self.params
            .iter()
            .filter(|p| !p.kind.is_positional())
            .filter_map(|p| self.supplied.get(&p.name).map(|v| (p.name.as_str(), v)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.supplied.len()
    }

    pub fn is_empty(&self) -> bool {
        self.supplied.is_empty()
    }
}

type Constructor<T> = Box<dyn Fn(&CallArgs) -> std::result::Result<T, HandlerError>>;
type Handler<T> = Box<dyn Fn(&mut T, &CallArgs) -> std::result::Result<(), HandlerError>>;
type ParsedHook<T> = Box<dyn Fn(&mut T, &ParsedArguments)>;

/// A definition bound to its constructor and command handlers
pub struct Program<T> {
    definition: Arc<Definition>,
    settings: CliSettings,
    resolver: TypeResolver,
    constructor: Constructor<T>,
    handlers: HashMap<String, Handler<T>>,
    parsed_hook: Option<ParsedHook<T>>,
}

impl<T> Program<T> {
    pub fn new<F>(definition: Arc<Definition>, constructor: F) -> Self
    where
        F: Fn(&CallArgs) -> std::result::Result<T, HandlerError> + 'static,
    {
        Self {
            definition,
            settings: CliSettings::default(),
            resolver: TypeResolver::new(),
            constructor: Box::new(constructor),
            handlers: HashMap::new(),
            parsed_hook: None,
        }
    }

    pub fn settings(mut self, settings: CliSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Named parsers come from `resolver`; none literals always come from the settings
    pub fn resolver(mut self, resolver: TypeResolver) -> Self {
        self.resolver = resolver;
        self
    }

    /// Bind the code run for `command`
    pub fn handler<F>(mut self, command: &str, handler: F) -> Self
    where
        F: Fn(&mut T, &CallArgs) -> std::result::Result<(), HandlerError> + 'static,
    {
        self.handlers.insert(command.to_string(), Box::new(handler));
        self
    }

    /// Called with the parse result after construction, before the command
    pub fn on_parsed_arguments<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut T, &ParsedArguments) + 'static,
    {
        self.parsed_hook = Some(Box::new(hook));
        self
    }

    pub fn definition(&self) -> &Definition {
        &self.definition
    }

    /// Synthesize the command tree, checking every command has a handler
    pub fn build(&self) -> std::result::Result<SynthesizedCli, DeclarationError> {
        let resolver = self
            .resolver
            .clone()
            .with_none_literals(&self.settings.none_literals);
        let cli = CliBuilder::new(&self.definition, &resolver, &self.settings).build()?;
        if let Some(command) = cli.command_names().find(|name| !self.handlers.contains_key(*name)) {
            return Err(DeclarationError::UnboundCommand {
                command: command.to_string(),
            });
        }
        Ok(cli)
    }

    /// Construct the instance and run the parsed command on it
    pub fn dispatch(&self, cli: &SynthesizedCli, parsed: &ParsedArguments) -> Result<T> {
        let surface = cli
            .surface(parsed.command())
            .ok_or_else(|| DispatchError::UnknownCommand {
                name: parsed.command().to_string(),
            })?;

        let feed = Feed::from_parsed(parsed);
        let init_args = feed.call_args(cli.constructor());
        debug!(args = ?init_args.supplied(), "constructing instance");
        let mut instance =
            (self.constructor)(&init_args).map_err(|source| DispatchError::Handler {
                handler: CONSTRUCTOR.to_string(),
                source,
            })?;

        if let Some(hook) = &self.parsed_hook {
            hook(&mut instance, parsed);
        }

        self.call(&mut instance, &surface.spec.name, &feed.call_args(&surface.spec.params))?;
        Ok(instance)
    }

    /// Call a command directly, bypassing the command line
    ///
    /// Parameters hidden from the command line, such as ignored ones, can be
    /// supplied here.
    pub fn invoke(&self, instance: &mut T, command: &str, feed: &Feed) -> Result<()> {
        let unknown = || DispatchError::UnknownCommand {
            name: command.to_string(),
        };
        let decl = self.definition.find_handler(command).ok_or_else(unknown)?;
        let inherit = decl.command_options().is_none_or(|options| options.inherit);
        let params = effective_params(&self.definition, command, inherit)?;
        self.call(instance, command, &feed.call_args(&params))?;
        Ok(())
    }

    fn call(
        &self,
        instance: &mut T,
        command: &str,
        args: &CallArgs,
    ) -> std::result::Result<(), DispatchError> {
        let handler = self
            .handlers
            .get(command)
            .ok_or_else(|| DispatchError::UnknownCommand {
                name: command.to_string(),
            })?;

        info!(command, args = ?args.supplied(), "invoking command");
        handler(instance, args).map_err(|source| DispatchError::Handler {
            handler: command.to_string(),
            source,
        })
    }

    /// Build, parse `argv` and dispatch
    ///
    /// With `--print-args` the parsed values are printed before the command
    /// runs.
    pub fn run_from<I, S>(&self, argv: I) -> Result<T>
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        let cli = self.build()?;
        let parsed = cli.parse_from(argv)?;
        if parsed.print_args() {
            println!("{}", parsed.render());
        }
        self.dispatch(&cli, &parsed)
    }

    pub fn run(&self) -> Result<T> {
        self.run_from(std::env::args_os())
    }
}
