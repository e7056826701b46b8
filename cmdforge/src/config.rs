//! Settings for a synthesized CLI
//!
//! Loading these from files or the environment is left to the embedding
//! binary; everything here deserializes with serde so any layered loader can
//! produce it.

use serde::{Deserialize, Serialize};

/// Spellings the "no value" parser accepts unless configured otherwise
pub const DEFAULT_NONE_LITERALS: &[&str] = &["none", "null"];

/// Top-level shape of the synthesized CLI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliSettings {
    /// Program name shown in usage lines
    pub program: String,
    pub about: Option<String>,
    pub version: Option<String>,
    /// Whether the constructor signature is merged with its bases
    pub inherit_constructor: bool,
    /// Command used when the first token names no command
    pub default_command: Option<String>,
    /// Accepted spellings of "no value", matched case-insensitively
    pub none_literals: Vec<String>,
}

impl Default for CliSettings {
    fn default() -> Self {
        Self {
            program: "cmdforge".to_string(),
            about: None,
            version: None,
            inherit_constructor: true,
            default_command: None,
            none_literals: DEFAULT_NONE_LITERALS.iter().map(|l| l.to_string()).collect(),
        }
    }
}

impl CliSettings {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    pub fn about(mut self, about: impl Into<String>) -> Self {
        self.about = Some(about.into());
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn default_command(mut self, command: impl Into<String>) -> Self {
        self.default_command = Some(command.into());
        self
    }
}
