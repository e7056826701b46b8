//! Parameter model
//!
//! One formal parameter of a handler: its name, how it may be passed, an
//! optional default and an optional type annotation. Every other stage of the
//! pipeline exchanges these.

use crate::types::TypeRef;
use serde_json::Value;
use std::fmt;

/// How a parameter may be supplied
///
/// Variants are declared in the order they may appear in a parameter list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ParamKind {
    PositionalOnly,
    PositionalOrKeyword,
    /// `*args`: collects the inherited positional parameters
    VarPositional,
    KeywordOnly,
    /// `**kwargs`: collects the inherited keyword parameters
    VarKeyword,
}

impl ParamKind {
    pub fn is_variadic(self) -> bool {
        matches!(self, ParamKind::VarPositional | ParamKind::VarKeyword)
    }

    /// Whether a value for this parameter can be passed by position
    pub fn is_positional(self) -> bool {
        matches!(self, ParamKind::PositionalOnly | ParamKind::PositionalOrKeyword)
    }
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ParamKind::PositionalOnly => "positional-only",
            ParamKind::PositionalOrKeyword => "positional-or-keyword",
            ParamKind::VarPositional => "var-positional",
            ParamKind::KeywordOnly => "keyword-only",
            ParamKind::VarKeyword => "var-keyword",
        };
        f.write_str(label)
    }
}

/// One formal parameter of a handler
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub kind: ParamKind,
    pub default: Option<Value>,
    pub annotation: Option<TypeRef>,
}

impl Parameter {
    /// A positional-or-keyword parameter with no default and no annotation
    pub fn new(name: impl Into<String>) -> Self {
        Self::of_kind(name, ParamKind::PositionalOrKeyword)
    }

    pub fn of_kind(name: impl Into<String>, kind: ParamKind) -> Self {
        Self {
            name: name.into(),
            kind,
            default: None,
            annotation: None,
        }
    }

    pub fn positional_only(name: impl Into<String>) -> Self {
        Self::of_kind(name, ParamKind::PositionalOnly)
    }

    pub fn keyword_only(name: impl Into<String>) -> Self {
        Self::of_kind(name, ParamKind::KeywordOnly)
    }

    /// The `*args` marker
    pub fn var_positional(name: impl Into<String>) -> Self {
        Self::of_kind(name, ParamKind::VarPositional)
    }

    /// The `**kwargs` marker
    pub fn var_keyword(name: impl Into<String>) -> Self {
        Self::of_kind(name, ParamKind::VarKeyword)
    }

    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn annotation(mut self, annotation: TypeRef) -> Self {
        self.annotation = Some(annotation);
        self
    }

    /// The same parameter passed a different way
    pub fn with_kind(&self, kind: ParamKind) -> Self {
        Self {
            kind,
            ..self.clone()
        }
    }

    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builder_defaults() {
        let param = Parameter::new("something");
        assert_eq!(param.kind, ParamKind::PositionalOrKeyword);
        assert!(!param.has_default());
        assert!(param.annotation.is_none());

        let param = Parameter::keyword_only("title").default("fancy driver");
        assert_eq!(param.kind, ParamKind::KeywordOnly);
        assert_eq!(param.default, Some(json!("fancy driver")));
    }

    #[test]
    fn test_with_kind_keeps_everything_else() {
        let param = Parameter::new("title")
            .default("fancy")
            .annotation(TypeRef::Str);
        let moved = param.with_kind(ParamKind::KeywordOnly);
        assert_eq!(moved.kind, ParamKind::KeywordOnly);
        assert_eq!(moved.name, param.name);
        assert_eq!(moved.default, param.default);
        assert_eq!(moved.annotation, param.annotation);
    }

    #[test]
    fn test_kind_ordering_follows_declaration_rules() {
        assert!(ParamKind::PositionalOnly < ParamKind::PositionalOrKeyword);
        assert!(ParamKind::VarPositional < ParamKind::KeywordOnly);
        assert!(ParamKind::KeywordOnly < ParamKind::VarKeyword);
        assert!(ParamKind::VarKeyword.is_variadic());
        assert!(!ParamKind::KeywordOnly.is_positional());
    }
}
