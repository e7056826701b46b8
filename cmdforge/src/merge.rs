//! Signature merging
//!
//! A handler that re-declares an inherited handler does not automatically keep
//! the inherited parameters. It keeps exactly what it declares, plus whatever
//! its variadic markers capture from the base:
//!
//! - `*args` captures the base parameters before the first keyword-only
//!   parameter of the derived list (all positional-capable base parameters
//!   when there is none), passed positionally.
//! - `**kwargs` captures the base parameters from that keyword-only parameter
//!   onwards (all of them when there is none), passed by keyword.
//!
//! Captured parameters take the marker's place. Names the derived handler
//! declares itself always win over captured ones.

use crate::error::DeclarationError;
use crate::parameter::{ParamKind, Parameter};
use crate::registry::Definition;
use crate::signature::ExtractSignature;
use indexmap::IndexMap;
use std::collections::HashSet;
use tracing::{debug, trace};

/// Merge a derived handler's declared list over its base's effective list
pub fn merge_params(base: &[Parameter], derived: Vec<Parameter>) -> Vec<Parameter> {
    if !derived.iter().any(|p| p.kind.is_variadic()) {
        return derived;
    }

    let declared: HashSet<String> = derived
        .iter()
        .filter(|p| !p.kind.is_variadic())
        .map(|p| p.name.clone())
        .collect();

    // Where the base's keyword region starts, located by the derived handler's
    // first keyword-only parameter
    let boundary = derived
        .iter()
        .find(|p| p.kind == ParamKind::KeywordOnly)
        .and_then(|k| base.iter().position(|b| b.name == k.name));

    let mut effective: IndexMap<String, Parameter> = IndexMap::new();
    for param in derived {
        match param.kind {
            ParamKind::VarPositional => {
                let captured: Vec<&Parameter> = match boundary {
                    Some(stop) => base[..stop].iter().collect(),
                    None => base.iter().filter(|b| b.kind.is_positional()).collect(),
                };
                splice(&mut effective, &declared, captured, ParamKind::PositionalOnly);
            }
            ParamKind::VarKeyword => {
                let captured: Vec<&Parameter> = match boundary {
                    Some(start) => base[start..].iter().collect(),
                    None => base.iter().collect(),
                };
                splice(&mut effective, &declared, captured, ParamKind::KeywordOnly);
            }
            _ => {
                effective.insert(param.name.clone(), param);
            }
        }
    }

    effective.into_values().collect()
}

fn splice(
    effective: &mut IndexMap<String, Parameter>,
    declared: &HashSet<String>,
    captured: Vec<&Parameter>,
    kind: ParamKind,
) {
    for param in captured {
        if param.kind.is_variadic()
            || declared.contains(&param.name)
            || effective.contains_key(&param.name)
        {
            continue;
        }
        trace!(parameter = %param.name, %kind, "inheriting parameter");
        effective.insert(param.name.clone(), param.with_kind(kind));
    }
}

/// Combine the effective lists of several bases, left to right
///
/// Bases must agree on the kind and position of every parameter they share.
pub fn combine_bases(
    definition: &str,
    handler: &str,
    lists: &[(&str, Vec<Parameter>)],
) -> Result<Vec<Parameter>, DeclarationError> {
    let mut combined: IndexMap<&str, (&str, usize, &Parameter)> = IndexMap::new();

    for &(base, ref params) in lists {
        for (index, param) in params.iter().enumerate() {
            match combined.get(param.name.as_str()) {
                Some((seen_base, seen_index, seen)) => {
                    if seen.kind != param.kind || *seen_index != index {
                        return Err(DeclarationError::BaseConflict {
                            definition: definition.to_string(),
                            handler: handler.to_string(),
                            parameter: param.name.clone(),
                            first: format!("{seen_base}: {} at {seen_index}", seen.kind),
                            second: format!("{base}: {} at {index}", param.kind),
                        });
                    }
                }
                None => {
                    combined.insert(param.name.as_str(), (base, index, param));
                }
            }
        }
    }

    Ok(combined
        .into_values()
        .map(|(_, _, param)| param.clone())
        .collect())
}

/// The effective parameter list of `handler` on `definition`
///
/// Walks the definition's bases recursively. With `inherit` off, a handler
/// declared on `definition` keeps its declared list verbatim. A handler the
/// definition does not declare is taken from the nearest base that does.
pub fn effective_params(
    definition: &Definition,
    handler: &str,
    inherit: bool,
) -> Result<Vec<Parameter>, DeclarationError> {
    let Some(decl) = definition.own_handler(handler) else {
        for base in definition.bases() {
            if base.find_handler(handler).is_some() {
                return effective_params(base, handler, inherit);
            }
        }
        return Ok(Vec::new());
    };

    let declared = decl.extract();
    if !inherit || definition.bases().is_empty() {
        return Ok(declared);
    }

    let mut lists = Vec::with_capacity(definition.bases().len());
    for base in definition.bases() {
        lists.push((base.name(), effective_params(base, handler, true)?));
    }
    let base_params = combine_bases(definition.name(), handler, &lists)?;
    let merged = merge_params(&base_params, declared);

    debug!(
        definition = definition.name(),
        handler,
        params = ?merged.iter().map(|p| p.name.as_str()).collect::<Vec<_>>(),
        "merged signature"
    );
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{TypeRef, ValueParser};
    use serde_json::json;
    use std::sync::Arc;

    fn names(params: &[Parameter]) -> Vec<&str> {
        params.iter().map(|p| p.name.as_str()).collect()
    }

    fn prettified() -> TypeRef {
        TypeRef::custom(
            TypeRef::Str,
            ValueParser::mapping("prettify", |s| format!("pretty {s}")),
        )
    }

    fn driver() -> Arc<Definition> {
        Definition::builder("Driver")
            .constructor([Parameter::new("name").annotation(TypeRef::Str)])
            .command("drive", [Parameter::new("something")])
            .command(
                "drive_wash",
                [Parameter::new("something").annotation(TypeRef::Str).default("car")],
            )
            .build()
            .unwrap()
    }

    fn fancy_driver() -> Arc<Definition> {
        Definition::builder("FancyDriver")
            .base(driver())
            .constructor([
                Parameter::var_positional("args"),
                Parameter::var_keyword("kwargs"),
            ])
            .command(
                "drive",
                [
                    Parameter::new("something").annotation(prettified()),
                    Parameter::new("title").annotation(TypeRef::Str).default("fancy driver"),
                    Parameter::var_keyword("kwargs"),
                ],
            )
            .build()
            .unwrap()
    }

    #[test]
    fn test_override_replaces_annotation() {
        let base = vec![Parameter::new("x").annotation(TypeRef::Int)];
        let derived = vec![Parameter::new("x").annotation(TypeRef::Float), Parameter::var_keyword("kwargs")];
        let merged = merge_params(&base, derived);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].annotation, Some(TypeRef::Float));
        assert_eq!(merged[0].kind, ParamKind::PositionalOrKeyword);
    }

    #[test]
    fn test_no_variadics_drops_unmentioned_base_params() {
        let base = vec![Parameter::new("a"), Parameter::new("b")];
        let merged = merge_params(&base, vec![Parameter::new("b").default(1)]);
        assert_eq!(names(&merged), vec!["b"]);
        assert_eq!(merged[0].default, Some(json!(1)));
    }

    #[test]
    fn test_var_positional_splice_is_idempotent() {
        let base = vec![Parameter::new("a"), Parameter::new("b"), Parameter::new("k")];
        let derived = vec![Parameter::var_positional("args"), Parameter::new("k")];

        let once = merge_params(&base, derived);
        assert_eq!(names(&once), vec!["a", "b", "k"]);
        assert_eq!(once[0].kind, ParamKind::PositionalOnly);
        assert_eq!(once[2].kind, ParamKind::PositionalOrKeyword);

        let twice = merge_params(&base, once.clone());
        assert_eq!(twice, once);
    }

    #[test]
    fn test_var_positional_stops_at_keyword_only() {
        let base = vec![
            Parameter::new("a"),
            Parameter::new("b"),
            Parameter::keyword_only("k"),
            Parameter::keyword_only("z"),
        ];
        let derived = vec![Parameter::var_positional("args"), Parameter::keyword_only("k")];
        let merged = merge_params(&base, derived);
        assert_eq!(names(&merged), vec!["a", "b", "k"]);
    }

    #[test]
    fn test_var_keyword_captures_from_keyword_only_onwards() {
        let base = vec![
            Parameter::new("a"),
            Parameter::keyword_only("k").default(1),
            Parameter::keyword_only("z").default(2),
        ];
        let derived = vec![
            Parameter::var_positional("args"),
            Parameter::keyword_only("k").default(10),
            Parameter::var_keyword("kwargs"),
        ];
        let merged = merge_params(&base, derived);
        assert_eq!(names(&merged), vec!["a", "k", "z"]);
        assert_eq!(merged[1].default, Some(json!(10)));
        assert_eq!(merged[2].kind, ParamKind::KeywordOnly);
    }

    #[test]
    fn test_var_keyword_without_keyword_only_captures_everything() {
        let base = vec![Parameter::new("a"), Parameter::new("b").default(2)];
        let derived = vec![Parameter::new("c"), Parameter::var_keyword("kwargs")];
        let merged = merge_params(&base, derived);
        assert_eq!(names(&merged), vec!["c", "a", "b"]);
        assert!(merged[1..].iter().all(|p| p.kind == ParamKind::KeywordOnly));
    }

    #[test]
    fn test_splice_never_copies_base_markers() {
        let base = vec![Parameter::new("a"), Parameter::var_positional("rest")];
        let merged = merge_params(&base, vec![Parameter::var_keyword("kwargs")]);
        assert_eq!(names(&merged), vec!["a"]);
    }

    #[test]
    fn test_no_parent_returns_declared_list() {
        let params = effective_params(&driver(), "drive_wash", true).unwrap();
        assert_eq!(params[0].default, Some(json!("car")));
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn test_constructor_captured_through_variadics() {
        let params = effective_params(&fancy_driver(), "init", true).unwrap();
        assert_eq!(names(&params), vec!["name"]);
        assert_eq!(params[0].kind, ParamKind::PositionalOnly);
        assert_eq!(params[0].annotation, Some(TypeRef::Str));
    }

    #[test]
    fn test_three_level_override() {
        let super_fancy = Definition::builder("SuperFancyDriver")
            .base(fancy_driver())
            .command(
                "drive",
                [
                    Parameter::new("something").annotation(TypeRef::Str),
                    Parameter::new("title").default("super fancy driver"),
                    Parameter::var_keyword("kwargs"),
                ],
            )
            .build()
            .unwrap();

        let params = effective_params(&super_fancy, "drive", true).unwrap();
        assert_eq!(names(&params), vec!["something", "title"]);
        assert_eq!(params[0].annotation, Some(TypeRef::Str));
        assert_eq!(params[1].default, Some(json!("super fancy driver")));
    }

    #[test]
    fn test_inherit_off_keeps_declaration_verbatim() {
        let params = effective_params(&fancy_driver(), "init", false).unwrap();
        assert_eq!(names(&params), vec!["args", "kwargs"]);
    }

    #[test]
    fn test_undeclared_handler_comes_from_nearest_base() {
        let params = effective_params(&fancy_driver(), "drive_wash", true).unwrap();
        assert_eq!(names(&params), vec!["something"]);
        assert!(effective_params(&fancy_driver(), "missing", true).unwrap().is_empty());
    }

    #[test]
    fn test_bases_sharing_a_parameter_must_agree() {
        let left = Definition::builder("Left")
            .command("run", [Parameter::new("a"), Parameter::new("shared")])
            .build()
            .unwrap();
        let agreeing = Definition::builder("Agreeing")
            .command("run", [Parameter::new("b"), Parameter::new("shared")])
            .build()
            .unwrap();
        let clashing = Definition::builder("Clashing")
            .command("run", [Parameter::new("shared")])
            .build()
            .unwrap();

        let child = |other: Arc<Definition>| {
            Definition::builder("Child")
                .base(left.clone())
                .base(other)
                .command("run", [Parameter::var_positional("args")])
                .build()
                .unwrap()
        };

        let params = effective_params(&child(agreeing), "run", true).unwrap();
        assert_eq!(names(&params), vec!["a", "shared", "b"]);

        let err = effective_params(&child(clashing), "run", true).unwrap_err();
        assert!(matches!(err, DeclarationError::BaseConflict { ref parameter, .. } if parameter == "shared"));
    }
}
