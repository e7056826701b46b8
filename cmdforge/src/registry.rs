//! Definitions, command discovery and the synthesized command tree
//!
//! A [`Definition`] is a named set of handler declarations with an ordered
//! list of base definitions. [`CliBuilder`] walks a definition, computes the
//! effective signature of the constructor and every command, and assembles a
//! clap command tree from them:
//!
//! ```text
//! drivers
//! ├── drive          # init args, --print-args, drive args
//! └── drive_wash     # init args, --print-args, drive_wash args
//! ```

use crate::config::CliSettings;
use crate::dispatch::ParsedArguments;
use crate::error::{DeclarationError, ParseError};
use crate::merge::effective_params;
use crate::parameter::Parameter;
use crate::signature::{validate_signature, ExtractSignature};
use crate::synthesis::{
    intern, ArgumentDecl, ArgumentSynthesizer, ClapArguments, COMMAND_KEY,
};
use crate::types::TypeResolver;
use clap::error::ErrorKind;
use clap::{ArgMatches, Command};
use indexmap::IndexMap;
use std::collections::BTreeSet;
use std::ffi::OsString;
use std::sync::Arc;
use tracing::{debug, info};

/// Handler name of the constructor
pub const CONSTRUCTOR: &str = "init";

// clap's own `--help` id on every subcommand
const HELP_KEY: &str = "help";

/// Options attached to a handler that is exposed as a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOptions {
    /// Whether the signature is merged with inherited declarations
    pub inherit: bool,
    pub about: Option<String>,
}

impl Default for CommandOptions {
    fn default() -> Self {
        Self {
            inherit: true,
            about: None,
        }
    }
}

impl CommandOptions {
    /// Keep the declared signature verbatim
    pub fn no_inherit() -> Self {
        Self {
            inherit: false,
            ..Self::default()
        }
    }

    pub fn about(mut self, about: impl Into<String>) -> Self {
        self.about = Some(about.into());
        self
    }
}

/// One handler declared on a definition
#[derive(Debug, Clone, PartialEq)]
pub struct HandlerDecl {
    name: String,
    params: Vec<Parameter>,
    command: Option<CommandOptions>,
}

impl HandlerDecl {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[Parameter] {
        &self.params
    }

    /// `Some` when the handler is tagged as a command
    pub fn command_options(&self) -> Option<&CommandOptions> {
        self.command.as_ref()
    }

    pub fn is_command(&self) -> bool {
        self.command.is_some()
    }
}

impl ExtractSignature for HandlerDecl {
    fn extract(&self) -> Vec<Parameter> {
        self.params.clone()
    }
}

/// A named set of handlers extending zero or more bases
#[derive(Debug)]
pub struct Definition {
    name: String,
    bases: Vec<Arc<Definition>>,
    handlers: IndexMap<String, HandlerDecl>,
}

impl Definition {
    pub fn builder(name: impl Into<String>) -> DefinitionBuilder {
        DefinitionBuilder {
            name: name.into(),
            bases: Vec::new(),
            handlers: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Direct bases, in declaration order
    pub fn bases(&self) -> &[Arc<Definition>] {
        &self.bases
    }

    /// The handler declared on this definition itself
    pub fn own_handler(&self, name: &str) -> Option<&HandlerDecl> {
        self.handlers.get(name)
    }

    /// The nearest declaration of `name`: this definition first, then each
    /// base depth-first, left to right
    pub fn find_handler(&self, name: &str) -> Option<&HandlerDecl> {
        self.own_handler(name)
            .or_else(|| self.bases.iter().find_map(|base| base.find_handler(name)))
    }

    /// Every handler name reachable from this definition
    pub fn handler_names(&self) -> BTreeSet<&str> {
        let mut names: BTreeSet<&str> = self.handlers.keys().map(String::as_str).collect();
        for base in &self.bases {
            names.extend(base.handler_names());
        }
        names
    }

    /// Handlers exposed as commands, sorted by name
    ///
    /// A handler counts as a command when its nearest declaration is tagged.
    /// The constructor is never a command.
    pub fn commands(&self) -> Vec<&HandlerDecl> {
        self.handler_names()
            .into_iter()
            .filter(|name| *name != CONSTRUCTOR)
            .filter_map(|name| self.find_handler(name))
            .filter(|decl| decl.is_command())
            .collect()
    }
}

/// Collects handler declarations for a [`Definition`]
#[derive(Debug)]
pub struct DefinitionBuilder {
    name: String,
    bases: Vec<Arc<Definition>>,
    handlers: Vec<HandlerDecl>,
}

impl DefinitionBuilder {
    /// Append a base; earlier bases take precedence
    pub fn base(mut self, base: Arc<Definition>) -> Self {
        self.bases.push(base);
        self
    }

    pub fn constructor(self, params: impl IntoIterator<Item = Parameter>) -> Self {
        self.push(CONSTRUCTOR, params, None)
    }

    /// A handler that is not exposed as a command
    pub fn handler(self, name: &str, params: impl IntoIterator<Item = Parameter>) -> Self {
        self.push(name, params, None)
    }

    pub fn command(self, name: &str, params: impl IntoIterator<Item = Parameter>) -> Self {
        self.push(name, params, Some(CommandOptions::default()))
    }

    pub fn command_with(
        self,
        name: &str,
        params: impl IntoIterator<Item = Parameter>,
        options: CommandOptions,
    ) -> Self {
        self.push(name, params, Some(options))
    }

    fn push(
        mut self,
        name: &str,
        params: impl IntoIterator<Item = Parameter>,
        command: Option<CommandOptions>,
    ) -> Self {
        self.handlers.push(HandlerDecl {
            name: name.to_string(),
            params: params.into_iter().collect(),
            command,
        });
        self
    }

    /// Validate every declared signature and freeze the definition
    pub fn build(self) -> Result<Arc<Definition>, DeclarationError> {
        let mut handlers = IndexMap::with_capacity(self.handlers.len());
        for decl in self.handlers {
            validate_signature(&decl.name, &decl.params)?;
            if handlers.contains_key(&decl.name) {
                return Err(DeclarationError::InvalidSignature {
                    handler: decl.name,
                    reason: format!("declared twice on '{}'", self.name),
                });
            }
            handlers.insert(decl.name.clone(), decl);
        }

        Ok(Arc::new(Definition {
            name: self.name,
            bases: self.bases,
            handlers,
        }))
    }
}

/// A discovered command and its effective signature
#[derive(Debug, Clone, PartialEq)]
pub struct CommandSpec {
    pub name: String,
    pub params: Vec<Parameter>,
    pub options: CommandOptions,
}

/// A command together with every argument its subcommand carries
#[derive(Debug, Clone, PartialEq)]
pub struct CommandSurface {
    pub spec: CommandSpec,
    /// Constructor arguments, `--print-args`, then command arguments
    pub arguments: Vec<ArgumentDecl>,
}

/// The built command tree plus what dispatch needs to route a parse
#[derive(Debug, Clone)]
pub struct SynthesizedCli {
    command: Command,
    constructor: Vec<Parameter>,
    commands: IndexMap<String, CommandSurface>,
    default_command: Option<String>,
}

impl SynthesizedCli {
    pub fn command(&self) -> &Command {
        &self.command
    }

    /// Effective constructor signature
    pub fn constructor(&self) -> &[Parameter] {
        &self.constructor
    }

    pub fn command_names(&self) -> impl Iterator<Item = &str> {
        self.commands.keys().map(String::as_str)
    }

    pub fn surface(&self, command: &str) -> Option<&CommandSurface> {
        self.commands.get(command)
    }

    /// Parse a full argument vector, program name first
    pub fn parse_from<I, T>(&self, argv: I) -> Result<ParsedArguments, ParseError>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString>,
    {
        let mut argv: Vec<OsString> = argv.into_iter().map(Into::into).collect();
        self.insert_default_command(&mut argv);

        let matches = self.command.clone().try_get_matches_from(argv)?;
        self.extract_command(&matches).ok_or_else(|| {
            ParseError::Cli(
                self.command
                    .clone()
                    .error(ErrorKind::MissingSubcommand, "a command is required"),
            )
        })
    }

    /// Read the chosen command and its values out of clap's matches
    pub fn extract_command(&self, matches: &ArgMatches) -> Option<ParsedArguments> {
        let (name, sub_matches) = matches.subcommand()?;
        let surface = self.commands.get(name)?;

        let values = surface
            .arguments
            .iter()
            .filter_map(|decl| decl.read(sub_matches).map(|value| (decl.name.clone(), value)))
            .collect();

        Some(ParsedArguments::new(name, values))
    }

    fn insert_default_command(&self, argv: &mut Vec<OsString>) {
        let Some(default) = &self.default_command else {
            return;
        };
        if argv.is_empty() {
            return;
        }

        let explicit = argv.get(1).and_then(|token| token.to_str()).is_some_and(|token| {
            self.commands.contains_key(token)
                || matches!(token, "help" | "-h" | "--help" | "-V" | "--version")
        });
        if !explicit {
            debug!(command = %default, "using default command");
            argv.insert(1, OsString::from(default));
        }
    }
}

/// Builds the command tree for a definition
pub struct CliBuilder<'a> {
    definition: &'a Definition,
    resolver: &'a TypeResolver,
    settings: &'a CliSettings,
}

impl<'a> CliBuilder<'a> {
    pub fn new(
        definition: &'a Definition,
        resolver: &'a TypeResolver,
        settings: &'a CliSettings,
    ) -> Self {
        Self {
            definition,
            resolver,
            settings,
        }
    }

    /// Every command of the definition with its effective signature
    pub fn command_specs(&self) -> Result<Vec<CommandSpec>, DeclarationError> {
        self.definition
            .commands()
            .into_iter()
            .map(|decl| {
                let options = decl.command_options().cloned().unwrap_or_default();
                let params = effective_params(self.definition, decl.name(), options.inherit)?;
                Ok(CommandSpec {
                    name: decl.name().to_string(),
                    params,
                    options,
                })
            })
            .collect()
    }

    /// Build the complete command tree
    pub fn build(&self) -> Result<SynthesizedCli, DeclarationError> {
        let constructor = effective_params(
            self.definition,
            CONSTRUCTOR,
            self.settings.inherit_constructor,
        )?;
        let specs = self.command_specs()?;

        if let Some(default) = &self.settings.default_command {
            if !specs.iter().any(|spec| spec.name == *default) {
                return Err(DeclarationError::UnknownDefaultCommand {
                    name: default.clone(),
                    available: specs.iter().map(|spec| spec.name.clone()).collect(),
                });
            }
        }

        let mut cli = Command::new(intern(&self.settings.program))
            .subcommand_required(true)
            .arg_required_else_help(true);
        if let Some(about) = &self.settings.about {
            cli = cli.about(about.clone());
        }
        if let Some(version) = &self.settings.version {
            cli = cli.version(intern(version));
        }

        let synthesizer = ArgumentSynthesizer::new(self.resolver);
        let mut commands = IndexMap::with_capacity(specs.len());
        for spec in specs {
            let mut builder = ClapArguments::new(&spec.name)
                .reserve(COMMAND_KEY)
                .reserve(HELP_KEY);
            if let Some(about) = &spec.options.about {
                builder = builder.about(about.clone());
            }

            synthesizer.synthesize(&constructor, &mut builder)?;
            synthesizer.register(&mut builder, ArgumentDecl::print_args())?;
            synthesizer.synthesize(&spec.params, &mut builder)?;

            let (subcommand, arguments) = builder.into_parts();
            debug!(
                command = %spec.name,
                arguments = ?arguments.iter().map(|a| a.cli_name.as_str()).collect::<Vec<_>>(),
                "synthesized command"
            );
            cli = cli.subcommand(subcommand);
            commands.insert(spec.name.clone(), CommandSurface { spec, arguments });
        }

        info!(
            definition = self.definition.name(),
            commands = commands.len(),
            "built command line interface"
        );

        Ok(SynthesizedCli {
            command: cli,
            constructor,
            commands,
            default_command: self.settings.default_command.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypeRef;
    use serde_json::json;

    fn driver() -> Arc<Definition> {
        Definition::builder("Driver")
            .constructor([Parameter::new("name")])
            .command("drive", [Parameter::new("something")])
            .command("drive_wash", [Parameter::new("something").default("car")])
            .handler("honk", [])
            .build()
            .unwrap()
    }

    fn build(definition: &Definition, settings: &CliSettings) -> Result<SynthesizedCli, DeclarationError> {
        let resolver = TypeResolver::new();
        CliBuilder::new(definition, &resolver, settings).build()
    }

    #[test]
    fn test_commands_sorted_and_untagged_handlers_excluded() {
        let binding = driver();
        let names: Vec<&str> = binding.commands().iter().map(|d| d.name()).collect();
        assert_eq!(names, vec!["drive", "drive_wash"]);
    }

    #[test]
    fn test_nearest_declaration_decides_command_tag() {
        let derived = Definition::builder("Quiet")
            .base(driver())
            .handler("drive", [Parameter::new("something")])
            .build()
            .unwrap();
        let names: Vec<&str> = derived.commands().iter().map(|d| d.name()).collect();
        assert_eq!(names, vec!["drive_wash"]);
    }

    #[test]
    fn test_find_handler_prefers_left_base() {
        let left = Definition::builder("Left")
            .command("run", [Parameter::new("left")])
            .build()
            .unwrap();
        let right = Definition::builder("Right")
            .command("run", [Parameter::new("right")])
            .build()
            .unwrap();
        let child = Definition::builder("Child").base(left).base(right).build().unwrap();
        let found = child.find_handler("run").unwrap();
        assert_eq!(found.params()[0].name, "left");
    }

    #[test]
    fn test_handler_declared_twice_rejected() {
        let err = Definition::builder("Driver")
            .command("drive", [])
            .handler("drive", [])
            .build()
            .unwrap_err();
        assert!(matches!(err, DeclarationError::InvalidSignature { .. }));
    }

    #[test]
    fn test_argument_order_per_command() {
        let cli = build(&driver(), &CliSettings::new("drivers")).unwrap();
        let surface = cli.surface("drive").unwrap();
        let names: Vec<&str> = surface.arguments.iter().map(|a| a.cli_name.as_str()).collect();
        assert_eq!(names, vec!["name", "--print-args", "something"]);
        assert_eq!(cli.command_names().collect::<Vec<_>>(), vec!["drive", "drive_wash"]);
    }

    #[test]
    fn test_parse_reads_positionals_and_defaults() {
        let cli = build(&driver(), &CliSettings::new("drivers")).unwrap();
        let parsed = cli.parse_from(["drivers", "drive_wash", "John"]).unwrap();
        assert_eq!(parsed.command(), "drive_wash");
        assert_eq!(parsed.get("name"), Some(&json!("John")));
        assert_eq!(parsed.get("something"), Some(&json!("car")));
        assert_eq!(parsed.get("print_args"), Some(&json!(false)));
    }

    #[test]
    fn test_unknown_command_is_parse_error() {
        let cli = build(&driver(), &CliSettings::new("drivers")).unwrap();
        let err = cli.parse_from(["drivers", "fly", "John"]).unwrap_err();
        assert!(!err.is_informational());
    }

    #[test]
    fn test_option_abbreviation() {
        let cli = build(&driver(), &CliSettings::new("drivers")).unwrap();
        let parsed = cli
            .parse_from(["drivers", "drive_wash", "John", "--some", "bike"])
            .unwrap();
        assert_eq!(parsed.get("something"), Some(&json!("bike")));
    }

    #[test]
    fn test_constructor_name_collision() {
        let definition = Definition::builder("Driver")
            .constructor([Parameter::new("something")])
            .command("drive", [Parameter::new("something")])
            .build()
            .unwrap();
        let err = build(&definition, &CliSettings::default()).unwrap_err();
        assert!(matches!(
            err,
            DeclarationError::DuplicateArgument { ref command, ref name } if command == "drive" && name == "something"
        ));
    }

    #[test]
    fn test_reserved_print_args_collision() {
        let definition = Definition::builder("Driver")
            .command("drive", [Parameter::new("print_args").default(false)])
            .build()
            .unwrap();
        assert!(matches!(
            build(&definition, &CliSettings::default()),
            Err(DeclarationError::DuplicateArgument { .. })
        ));
    }

    #[test]
    fn test_default_command_inserted() {
        let settings = CliSettings::new("drivers").default_command("drive");
        let cli = build(&driver(), &settings).unwrap();

        let parsed = cli.parse_from(["drivers", "John", "car"]).unwrap();
        assert_eq!(parsed.command(), "drive");
        assert_eq!(parsed.get("something"), Some(&json!("car")));

        let parsed = cli.parse_from(["drivers", "drive_wash", "John"]).unwrap();
        assert_eq!(parsed.command(), "drive_wash");
    }

    #[test]
    fn test_unknown_default_command_rejected() {
        let settings = CliSettings::new("drivers").default_command("fly");
        let err = build(&driver(), &settings).unwrap_err();
        assert!(matches!(
            err,
            DeclarationError::UnknownDefaultCommand { ref available, .. } if available.len() == 2
        ));
    }

    #[test]
    fn test_inherit_off_per_command() {
        let base = driver();
        let derived = Definition::builder("Derived")
            .base(base)
            .command_with(
                "drive",
                [Parameter::var_keyword("kwargs")],
                CommandOptions::no_inherit().about("Drive without inheriting"),
            )
            .build()
            .unwrap();
        let cli = build(&derived, &CliSettings::default()).unwrap();
        let surface = cli.surface("drive").unwrap();
        assert!(surface.spec.params.iter().all(|p| p.kind.is_variadic()));
        assert_eq!(surface.arguments.len(), 2);
        assert_eq!(surface.spec.options.about.as_deref(), Some("Drive without inheriting"));
    }

    #[test]
    fn test_missing_parser_fails_build() {
        let definition = Definition::builder("Driver")
            .command("drive", [Parameter::new("car").annotation(TypeRef::named("Car"))])
            .build()
            .unwrap();
        let err = build(&definition, &CliSettings::default()).unwrap_err();
        assert_eq!(err.to_string(), "no parser for type Car (parameter 'car')");
    }
}
