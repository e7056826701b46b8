//! Signature extraction
//!
//! The merger never looks at handler bodies, only at the ordered parameter
//! list a handler declares. [`ExtractSignature`] is that contract.

use crate::error::DeclarationError;
use crate::parameter::{ParamKind, Parameter};
use std::collections::HashSet;

/// Produces the declared parameter list of a handler
///
/// Implementations must preserve declaration order and kinds exactly and must
/// not run the handler. Each call returns a fresh list.
pub trait ExtractSignature {
    fn extract(&self) -> Vec<Parameter>;
}

impl ExtractSignature for [Parameter] {
    fn extract(&self) -> Vec<Parameter> {
        self.to_vec()
    }
}

impl ExtractSignature for Vec<Parameter> {
    fn extract(&self) -> Vec<Parameter> {
        self.clone()
    }
}

/// Check a declared list against the parameter list invariants
///
/// Names are unique, there is at most one `*args` and one `**kwargs`, and
/// kinds never go backwards (positional-only, positional-or-keyword, `*args`,
/// keyword-only, `**kwargs`).
pub fn validate_signature(handler: &str, params: &[Parameter]) -> Result<(), DeclarationError> {
    let invalid = |reason: String| DeclarationError::InvalidSignature {
        handler: handler.to_string(),
        reason,
    };

    let mut seen = HashSet::new();
    for param in params {
        if !seen.insert(param.name.as_str()) {
            return Err(invalid(format!("duplicate parameter '{}'", param.name)));
        }
    }

    for kind in [ParamKind::VarPositional, ParamKind::VarKeyword] {
        if params.iter().filter(|p| p.kind == kind).count() > 1 {
            return Err(invalid(format!("more than one {kind} parameter")));
        }
    }

    for pair in params.windows(2) {
        if pair[1].kind < pair[0].kind {
            return Err(invalid(format!(
                "{} parameter '{}' follows {} parameter '{}'",
                pair[1].kind, pair[1].name, pair[0].kind, pair[0].name
            )));
        }
    }

    Ok(())
}
