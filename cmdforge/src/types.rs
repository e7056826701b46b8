//! Annotation to parser resolution
//!
//! A parameter's [`TypeRef`] decides how its command-line text becomes a
//! [`Value`], and whether it is exposed at all. The set of annotation shapes is
//! closed; anything the resolver cannot turn into a parser is rejected while
//! the CLI is being built, never at parse time.

use crate::config::DEFAULT_NONE_LITERALS;
use crate::error::DeclarationError;
use crate::parameter::Parameter;
use serde_json::{Number, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Why a piece of command-line text was rejected by a parser
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseFailure {
    #[error("'{value}' should be one of {expected:?}")]
    Literal { value: String, expected: Vec<String> },

    #[error("'{value}' is not a valid {target}: {reason}")]
    Invalid {
        value: String,
        target: String,
        reason: String,
    },

    /// Every member of a union rejected the text; one entry per member parser
    #[error("{}", describe_union(.value, .failures))]
    Union {
        value: String,
        failures: Vec<(String, ParseFailure)>,
    },
}

fn describe_union(value: &str, failures: &[(String, ParseFailure)]) -> String {
    let reasons: Vec<String> = failures
        .iter()
        .map(|(parser, failure)| format!("\t{parser}: {failure}"))
        .collect();
    format!(
        "'{value}' was rejected by every alternative:\n{}",
        reasons.join("\n")
    )
}

type ParseFn = dyn Fn(&str) -> Result<Value, ParseFailure> + Send + Sync;

/// A named text-to-value parsing function
///
/// Parsers are compared by name.
#[derive(Clone)]
pub struct ValueParser {
    name: Arc<str>,
    func: Arc<ParseFn>,
}

impl ValueParser {
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&str) -> Result<Value, ParseFailure> + Send + Sync + 'static,
    {
        Self {
            name: Arc::from(name.into()),
            func: Arc::new(func),
        }
    }

    /// Wrap a fallible conversion, reporting its error text as the reason
    pub fn from_fn<F, T, E>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&str) -> Result<T, E> + Send + Sync + 'static,
        T: Into<Value>,
        E: fmt::Display,
    {
        let name = name.into();
        let target = name.clone();
        Self::new(name, move |text| {
            func(text).map(Into::into).map_err(|e| ParseFailure::Invalid {
                value: text.to_string(),
                target: target.clone(),
                reason: e.to_string(),
            })
        })
    }

    /// Wrap a conversion that cannot fail
    pub fn mapping<F, T>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&str) -> T + Send + Sync + 'static,
        T: Into<Value>,
    {
        Self::new(name, move |text| Ok(func(text).into()))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parse(&self, text: &str) -> Result<Value, ParseFailure> {
        (self.func)(text)
    }

    /// Raw text
    pub fn identity() -> Self {
        Self::mapping("str", str::to_string)
    }

    /// Case-insensitive `true` / `false`
    pub fn boolean() -> Self {
        Self::new("bool", |text| {
            let lowered = check_literals(text, &["true", "false"])?;
            Ok(Value::Bool(lowered == "true"))
        })
    }

    /// Case-insensitive match against the accepted spellings of "no value"
    pub fn none<S: AsRef<str>>(literals: &[S]) -> Self {
        let literals: Vec<String> = literals
            .iter()
            .map(|l| l.as_ref().to_lowercase())
            .collect();
        Self::new("none", move |text| {
            check_literals(text, &literals)?;
            Ok(Value::Null)
        })
    }

    pub fn integer() -> Self {
        Self::from_fn("int", |text| text.trim().parse::<i64>())
    }

    pub fn float() -> Self {
        Self::new("float", |text| {
            let invalid = |reason: String| ParseFailure::Invalid {
                value: text.to_string(),
                target: "float".to_string(),
                reason,
            };
            let parsed = text
                .trim()
                .parse::<f64>()
                .map_err(|e| invalid(e.to_string()))?;
            Number::from_f64(parsed)
                .map(Value::Number)
                .ok_or_else(|| invalid("not a finite number".to_string()))
        })
    }

    /// Try each member left to right; the first success wins
    pub fn union(members: Vec<ValueParser>) -> Self {
        let names: Vec<&str> = members.iter().map(ValueParser::name).collect();
        let name = format!("union[{}]", names.join(", "));
        Self::new(name, move |text| {
            let mut failures = Vec::with_capacity(members.len());
            for member in &members {
                match member.parse(text) {
                    Ok(value) => return Ok(value),
                    Err(failure) => failures.push((member.name().to_string(), failure)),
                }
            }
            Err(ParseFailure::Union {
                value: text.to_string(),
                failures,
            })
        })
    }
}

fn check_literals<S: AsRef<str>>(text: &str, literals: &[S]) -> Result<String, ParseFailure> {
    let lowered = text.to_lowercase();
    if literals.iter().any(|l| l.as_ref() == lowered) {
        Ok(lowered)
    } else {
        Err(ParseFailure::Literal {
            value: text.to_string(),
            expected: literals.iter().map(|l| l.as_ref().to_string()).collect(),
        })
    }
}

impl fmt::Debug for ValueParser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ValueParser").field(&self.name).finish()
    }
}

impl PartialEq for ValueParser {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

/// Extra argument metadata carried by an annotation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArgMeta {
    pub help: Option<String>,
    /// Accepted on the command line but left out of help listings
    pub hidden: bool,
}

impl ArgMeta {
    pub fn help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    /// Outer metadata wins where both set a value
    fn layered_over(self, inner: ArgMeta) -> ArgMeta {
        ArgMeta {
            help: self.help.or(inner.help),
            hidden: self.hidden || inner.hidden,
        }
    }
}

/// Declared type of a parameter
#[derive(Debug, Clone, PartialEq)]
pub enum TypeRef {
    Str,
    Int,
    Float,
    Bool,
    /// The "no value" type
    NoneType,
    /// Boolean option toggled by presence
    Flag,
    /// Never exposed on the command line; the parameter must have a default
    Ignored,
    /// Resolved through parsers registered on the [`TypeResolver`]
    Named(String),
    /// An explicit parser that takes precedence over whatever `base` implies
    Custom {
        base: Box<TypeRef>,
        parser: ValueParser,
    },
    Union(Vec<TypeRef>),
    Annotated {
        inner: Box<TypeRef>,
        meta: ArgMeta,
    },
}

impl TypeRef {
    /// `T` or no value
    pub fn optional(inner: TypeRef) -> Self {
        TypeRef::Union(vec![inner, TypeRef::NoneType])
    }

    pub fn custom(base: TypeRef, parser: ValueParser) -> Self {
        TypeRef::Custom {
            base: Box::new(base),
            parser,
        }
    }

    pub fn annotated(inner: TypeRef, meta: ArgMeta) -> Self {
        TypeRef::Annotated {
            inner: Box::new(inner),
            meta,
        }
    }

    pub fn named(name: impl Into<String>) -> Self {
        TypeRef::Named(name.into())
    }

    /// Strip metadata wrappers, collecting their metadata
    fn peel(&self) -> (&TypeRef, ArgMeta) {
        match self {
            TypeRef::Annotated { inner, meta } => {
                let (core, inner_meta) = inner.peel();
                (core, meta.clone().layered_over(inner_meta))
            }
            other => (other, ArgMeta::default()),
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Str => f.write_str("str"),
            TypeRef::Int => f.write_str("int"),
            TypeRef::Float => f.write_str("float"),
            TypeRef::Bool => f.write_str("bool"),
            TypeRef::NoneType => f.write_str("none"),
            TypeRef::Flag => f.write_str("Flag"),
            TypeRef::Ignored => f.write_str("Ignored"),
            TypeRef::Named(name) => f.write_str(name),
            TypeRef::Custom { base, parser } => write!(f, "Custom[{base}, {}]", parser.name()),
            TypeRef::Union(members) => {
                let members: Vec<String> = members.iter().map(ToString::to_string).collect();
                write!(f, "Union[{}]", members.join(", "))
            }
            TypeRef::Annotated { inner, .. } => write!(f, "Annotated[{inner}]"),
        }
    }
}

/// What the synthesizer needs to know about one parameter
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    /// `None` for flags and ignored parameters
    pub parser: Option<ValueParser>,
    pub ignorable: bool,
    pub is_flag: bool,
    pub meta: ArgMeta,
}

/// Maps annotations to parsers
#[derive(Debug, Clone)]
pub struct TypeResolver {
    none_literals: Vec<String>,
    named: HashMap<String, ValueParser>,
}

impl Default for TypeResolver {
    fn default() -> Self {
        Self {
            none_literals: DEFAULT_NONE_LITERALS.iter().map(|l| l.to_string()).collect(),
            named: HashMap::new(),
        }
    }
}

impl TypeResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the accepted spellings of "no value"
    pub fn with_none_literals<I, S>(mut self, literals: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.none_literals = literals
            .into_iter()
            .map(|l| l.as_ref().to_lowercase())
            .collect();
        self
    }

    /// Make `TypeRef::Named(name)` resolvable
    pub fn register(mut self, name: impl Into<String>, parser: ValueParser) -> Self {
        self.named.insert(name.into(), parser);
        self
    }

    pub fn none_literals(&self) -> &[String] {
        &self.none_literals
    }

    /// Resolve one parameter
    ///
    /// Precedence: no annotation, `Ignored`, `Flag`, then the parser table.
    pub fn resolve(&self, param: &Parameter) -> Result<Resolution, DeclarationError> {
        let Some(annotation) = &param.annotation else {
            return Ok(Resolution {
                parser: Some(ValueParser::identity()),
                ignorable: false,
                is_flag: false,
                meta: ArgMeta::default(),
            });
        };

        let (core, meta) = annotation.peel();
        match core {
            TypeRef::Ignored if !param.has_default() => Err(DeclarationError::NotIgnorable {
                name: param.name.clone(),
            }),
            TypeRef::Ignored => Ok(Resolution {
                parser: None,
                ignorable: true,
                is_flag: false,
                meta,
            }),
            TypeRef::Flag => Ok(Resolution {
                parser: None,
                ignorable: false,
                is_flag: true,
                meta,
            }),
            other => Ok(Resolution {
                parser: Some(self.parser_for(&param.name, other)?),
                ignorable: false,
                is_flag: false,
                meta,
            }),
        }
    }

    /// The parser for a (non-marker) annotation
    pub fn parser_for(&self, parameter: &str, ty: &TypeRef) -> Result<ValueParser, DeclarationError> {
        let no_parser = || DeclarationError::NoParser {
            type_name: ty.to_string(),
            parameter: parameter.to_string(),
        };

        match ty {
            TypeRef::Str => Ok(ValueParser::identity()),
            TypeRef::Int => Ok(ValueParser::integer()),
            TypeRef::Float => Ok(ValueParser::float()),
            TypeRef::Bool => Ok(ValueParser::boolean()),
            TypeRef::NoneType => Ok(ValueParser::none(&self.none_literals)),
            TypeRef::Custom { parser, .. } => Ok(parser.clone()),
            TypeRef::Named(name) => self.named.get(name).cloned().ok_or_else(no_parser),
            TypeRef::Union(members) if members.is_empty() => Err(no_parser()),
            TypeRef::Union(members) => {
                let parsers = members
                    .iter()
                    .map(|member| self.parser_for(parameter, member))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(ValueParser::union(parsers))
            }
            TypeRef::Annotated { inner, .. } => self.parser_for(parameter, inner),
            TypeRef::Flag | TypeRef::Ignored => Err(no_parser()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    fn prettify() -> ValueParser {
        ValueParser::mapping("prettify", |s| format!("pretty {s}"))
    }

    #[rstest]
    #[case("true", true)]
    #[case("TRUE", true)]
    #[case("False", false)]
    fn test_bool_parser_accepts_literals(#[case] text: &str, #[case] expected: bool) {
        assert_eq!(ValueParser::boolean().parse(text), Ok(Value::Bool(expected)));
    }

    #[rstest]
    #[case("yes")]
    #[case("1")]
    #[case("")]
    fn test_bool_parser_rejects_other_text(#[case] text: &str) {
        let failure = ValueParser::boolean().parse(text).unwrap_err();
        assert!(matches!(failure, ParseFailure::Literal { .. }));
    }

    #[test]
    fn test_none_parser_uses_configured_spellings() {
        let default = TypeResolver::new();
        let parser = default.parser_for("x", &TypeRef::NoneType).unwrap();
        assert_eq!(parser.parse("None"), Ok(Value::Null));
        assert_eq!(parser.parse("null"), Ok(Value::Null));
        assert!(parser.parse("nil").is_err());

        let lisp = TypeResolver::new().with_none_literals(["NIL"]);
        let parser = lisp.parser_for("x", &TypeRef::NoneType).unwrap();
        assert_eq!(parser.parse("nil"), Ok(Value::Null));
        assert!(parser.parse("none").is_err());
    }

    #[test]
    fn test_union_first_success_wins() {
        let resolver = TypeResolver::new();
        let parser = resolver
            .parser_for("x", &TypeRef::Union(vec![TypeRef::Bool, TypeRef::NoneType]))
            .unwrap();
        assert_eq!(parser.parse("true"), Ok(Value::Bool(true)));
        assert_eq!(parser.parse("none"), Ok(Value::Null));

        let parser = resolver
            .parser_for("x", &TypeRef::Union(vec![TypeRef::Bool, TypeRef::Float]))
            .unwrap();
        assert_eq!(parser.parse("235.5"), Ok(json!(235.5)));
    }

    #[test]
    fn test_union_failure_lists_every_member() {
        let resolver = TypeResolver::new();
        let parser = resolver
            .parser_for("x", &TypeRef::Union(vec![TypeRef::Bool, TypeRef::NoneType]))
            .unwrap();
        let failure = parser.parse("5").unwrap_err();
        let message = failure.to_string();
        assert!(message.contains("bool: '5' should be one of"));
        assert!(message.contains("none: '5' should be one of"));
        match failure {
            ParseFailure::Union { failures, .. } => assert_eq!(failures.len(), 2),
            other => panic!("expected a union failure, got {other:?}"),
        }
    }

    #[test]
    fn test_optional_is_a_union_with_none() {
        let parser = TypeResolver::new()
            .parser_for("x", &TypeRef::optional(TypeRef::Bool))
            .unwrap();
        assert_eq!(parser.name(), "union[bool, none]");
        assert_eq!(parser.parse("None"), Ok(Value::Null));
    }

    #[test]
    fn test_custom_parser_ignores_base_type() {
        let param = Parameter::new("something").annotation(TypeRef::custom(TypeRef::Int, prettify()));
        let resolution = TypeResolver::new().resolve(&param).unwrap();
        let parser = resolution.parser.unwrap();
        assert_eq!(parser.parse("car"), Ok(json!("pretty car")));
    }

    #[test]
    fn test_no_annotation_is_identity() {
        let resolution = TypeResolver::new().resolve(&Parameter::new("x")).unwrap();
        assert!(!resolution.ignorable);
        assert!(!resolution.is_flag);
        assert_eq!(resolution.parser.unwrap().parse("raw"), Ok(json!("raw")));
    }

    #[test]
    fn test_ignored_requires_default() {
        let resolver = TypeResolver::new();

        let with_default = Parameter::new("hidden_option")
            .annotation(TypeRef::Ignored)
            .default("");
        let resolution = resolver.resolve(&with_default).unwrap();
        assert!(resolution.ignorable);
        assert!(resolution.parser.is_none());

        let without_default = Parameter::new("hidden_option").annotation(TypeRef::Ignored);
        let err = resolver.resolve(&without_default).unwrap_err();
        assert!(matches!(err, DeclarationError::NotIgnorable { ref name } if name == "hidden_option"));
    }

    #[test]
    fn test_flag_has_no_parser() {
        let param = Parameter::new("verbose").annotation(TypeRef::Flag);
        let resolution = TypeResolver::new().resolve(&param).unwrap();
        assert!(resolution.is_flag);
        assert!(resolution.parser.is_none());
    }

    #[test]
    fn test_annotated_carries_metadata() {
        let meta = ArgMeta::default().help("How loud").hidden();
        let param = Parameter::new("volume").annotation(TypeRef::annotated(TypeRef::Int, meta.clone()));
        let resolution = TypeResolver::new().resolve(&param).unwrap();
        assert_eq!(resolution.meta, meta);
        assert_eq!(resolution.parser.unwrap().parse("11"), Ok(json!(11)));
    }

    #[test]
    fn test_named_types_resolve_through_registry() {
        let resolver = TypeResolver::new().register("upper", ValueParser::mapping("upper", str::to_uppercase));
        let parser = resolver.parser_for("x", &TypeRef::named("upper")).unwrap();
        assert_eq!(parser.parse("car"), Ok(json!("CAR")));

        let err = resolver.parser_for("x", &TypeRef::named("path")).unwrap_err();
        assert_eq!(err.to_string(), "no parser for type path (parameter 'x')");
    }

    #[test]
    fn test_markers_inside_union_are_unsupported() {
        let err = TypeResolver::new()
            .parser_for("x", &TypeRef::Union(vec![TypeRef::Bool, TypeRef::Flag]))
            .unwrap_err();
        assert!(matches!(err, DeclarationError::NoParser { .. }));
    }

    #[test]
    fn test_scalar_parsers_report_reason() {
        let failure = ValueParser::integer().parse("2.5").unwrap_err();
        assert!(failure.to_string().starts_with("'2.5' is not a valid int"));
        assert_eq!(ValueParser::float().parse(" 1.5 "), Ok(json!(1.5)));
        assert!(ValueParser::float().parse("inf").is_err());
    }
}
