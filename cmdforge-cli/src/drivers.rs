//! The driver hierarchy behind the `drivers` binary
//!
//! Three trims, each extending the previous one:
//!
//! ```text
//! Driver(name)
//! ├── drive(something)
//! ├── wash(something, hidden_option: Ignored = "")
//! └── drive_wash(something: str = "car")
//! FancyDriver(*args, **kwargs)
//! ├── drive(something: prettified, title = "fancy driver", **kwargs)
//! └── wash(*args, **kwargs)          # plain handler, no longer a command
//! SuperFancyDriver(*args, **kwargs)
//! └── drive(something: str, title = "super fancy driver", **kwargs)
//! ```

use cmdforge::{
    CallArgs, CliSettings, DeclarationError, Definition, ParsedArguments, Parameter, Program,
    TypeRef, ValueParser,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trim {
    #[default]
    Plain,
    Fancy,
    SuperFancy,
}

impl fmt::Display for Trim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Trim::Plain => "plain",
            Trim::Fancy => "fancy",
            Trim::SuperFancy => "super fancy",
        };
        f.write_str(label)
    }
}

pub fn prettify(text: &str) -> String {
    format!("pretty {text}")
}

fn prettified_string() -> TypeRef {
    TypeRef::custom(TypeRef::Str, ValueParser::mapping("prettify", prettify))
}

pub fn driver_definition() -> Result<Arc<Definition>, DeclarationError> {
    Definition::builder("Driver")
        .constructor([Parameter::new("name").annotation(TypeRef::Str)])
        .handler("print_action", [Parameter::new("action"), Parameter::new("something")])
        .command("drive", [Parameter::new("something")])
        .command(
            "wash",
            [
                Parameter::new("something"),
                Parameter::new("hidden_option")
                    .annotation(TypeRef::Ignored)
                    .default(""),
            ],
        )
        .command(
            "drive_wash",
            [Parameter::new("something").annotation(TypeRef::Str).default("car")],
        )
        .build()
}

pub fn fancy_definition() -> Result<Arc<Definition>, DeclarationError> {
    Definition::builder("FancyDriver")
        .base(driver_definition()?)
        .constructor([
            Parameter::var_positional("args"),
            Parameter::var_keyword("kwargs"),
        ])
        .command(
            "drive",
            [
                Parameter::new("something").annotation(prettified_string()),
                Parameter::new("title")
                    .annotation(TypeRef::Str)
                    .default("fancy driver"),
                Parameter::var_keyword("kwargs"),
            ],
        )
        .handler(
            "wash",
            [
                Parameter::var_positional("args"),
                Parameter::var_keyword("kwargs"),
            ],
        )
        .build()
}

pub fn super_fancy_definition() -> Result<Arc<Definition>, DeclarationError> {
    Definition::builder("SuperFancyDriver")
        .base(fancy_definition()?)
        .constructor([
            Parameter::var_positional("args"),
            Parameter::var_keyword("kwargs"),
        ])
        .command(
            "drive",
            [
                Parameter::new("something").annotation(TypeRef::Str),
                Parameter::new("title")
                    .annotation(TypeRef::Str)
                    .default("super fancy driver"),
                Parameter::var_keyword("kwargs"),
            ],
        )
        .build()
}

pub fn definition(trim: Trim) -> Result<Arc<Definition>, DeclarationError> {
    match trim {
        Trim::Plain => driver_definition(),
        Trim::Fancy => fancy_definition(),
        Trim::SuperFancy => super_fancy_definition(),
    }
}

/// A driver of some trim; every action is printed and kept in the transcript
#[derive(Debug, Clone)]
pub struct Driver {
    name: String,
    trim: Trim,
    transcript: Vec<String>,
    parsed: Option<ParsedArguments>,
}

impl Driver {
    pub fn new(trim: Trim, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            trim,
            transcript: Vec::new(),
            parsed: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn transcript(&self) -> &[String] {
        &self.transcript
    }

    /// The parse result, kept by the super fancy trim only
    pub fn parsed(&self) -> Option<&ParsedArguments> {
        self.parsed.as_ref()
    }

    fn say(&mut self, line: String) {
        println!("{line}");
        self.transcript.push(line);
    }

    pub fn print_action(&mut self, action: &str, something: &str) {
        let line = format!("{} {action} {something}", self.name);
        self.say(line);
    }

    /// `title` falls back to the trim's own title
    pub fn drive(&mut self, something: &str, title: Option<&str>) {
        let default_title = match self.trim {
            Trim::Plain => None,
            Trim::Fancy => Some("fancy driver"),
            Trim::SuperFancy => Some("super fancy driver"),
        };
        if let Some(title) = title.or(default_title) {
            let line = format!("{} is a {title}", self.name);
            self.say(line);
        }
        self.print_action("drives a", something);
    }

    pub fn wash(&mut self, something: &str, hidden_option: &str) {
        self.print_action("washes a", &format!("{something}{hidden_option}"));
    }

    pub fn drive_wash(&mut self, something: &str) {
        self.drive(something, None);
        self.wash(something, ", good.");
    }
}

fn optional_string(args: &CallArgs, name: &str) -> Result<Option<String>, cmdforge::DispatchError> {
    match args.value(name) {
        Some(_) => args.get(name).map(Some),
        None => Ok(None),
    }
}

/// The program for `trim` with every handler bound
pub fn program(trim: Trim, settings: CliSettings) -> Result<Program<Driver>, DeclarationError> {
    let mut program = Program::new(definition(trim)?, move |args| {
        Ok(Driver::new(trim, args.get::<String>("name")?))
    })
    .settings(settings)
    .handler("print_action", |driver, args| {
        let action: String = args.get("action")?;
        let something: String = args.get("something")?;
        driver.print_action(&action, &something);
        Ok(())
    })
    .handler("drive", |driver, args| {
        let something: String = args.get("something")?;
        let title = optional_string(args, "title")?;
        driver.drive(&something, title.as_deref());
        Ok(())
    })
    .handler("wash", |driver, args| {
        let something: String = args.get("something")?;
        let hidden_option: String = args.get("hidden_option")?;
        driver.wash(&something, &hidden_option);
        Ok(())
    })
    .handler("drive_wash", |driver, args| {
        let something: String = args.get("something")?;
        driver.drive_wash(&something);
        Ok(())
    });

    if trim == Trim::SuperFancy {
        program = program.on_parsed_arguments(|driver, parsed| {
            debug!(command = parsed.command(), "keeping parsed arguments");
            driver.parsed = Some(parsed.clone());
        });
    }

    Ok(program)
}
