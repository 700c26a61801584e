//! # skillbox-error
//!
//! Typed rejection vocabulary for the skillbox evaluation sandbox.
//!
//! Provides [`Violation`] — the canonical type every crate uses to name a
//! static-validation rejection. A violation means the candidate's source
//! text contained a denylisted construct and was refused before any
//! isolated execution was spawned.

use thiserror::Error;

/// A static-validation rejection.
///
/// Produced by the pre-execution gate when a candidate's syntax tree
/// contains a denylisted construct. The gate stops at the first match in
/// pre-order traversal, so exactly one violation is reported per rejected
/// candidate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum Violation {
    /// A denylisted syntactic construct (e.g. a `with` statement or an
    /// `import` declaration).
    #[error("forbidden syntax: {construct}")]
    ForbiddenSyntax {
        /// The construct kind, e.g. `"with statement"`.
        construct: String,
    },

    /// A call (or `new`) naming a denylisted identifier (e.g. `eval`,
    /// `open`, `Function`, `require`, dynamic `import`).
    #[error("forbidden call: {name}")]
    ForbiddenCall {
        /// The denylisted name in call position.
        name: String,
    },

    /// The candidate's source text could not be parsed.
    #[error("parse error: {message}")]
    Parse {
        /// The parser's first diagnostic.
        message: String,
    },

    /// Bracket nesting exceeds the pre-parse depth bound.
    #[error("nesting depth {actual} exceeds maximum {max}")]
    NestingTooDeep {
        /// Maximum allowed nesting depth.
        max: usize,
        /// Detected nesting depth.
        actual: usize,
    },
}

impl Violation {
    /// Stable code string for programmatic matching.
    pub fn code(&self) -> &'static str {
        match self {
            Self::ForbiddenSyntax { .. } => "FORBIDDEN_SYNTAX",
            Self::ForbiddenCall { .. } => "FORBIDDEN_CALL",
            Self::Parse { .. } => "PARSE_ERROR",
            Self::NestingTooDeep { .. } => "NESTING_TOO_DEEP",
        }
    }

    /// Structured JSON form for report consumers.
    ///
    /// Always carries `code` and `message`; `construct` or `call` is
    /// present when the rejection names one.
    pub fn to_structured_error(&self) -> serde_json::Value {
        let mut obj = serde_json::json!({
            "code": self.code(),
            "message": self.to_string(),
        });
        match self {
            Self::ForbiddenSyntax { construct } => {
                obj["construct"] = serde_json::Value::String(construct.clone());
            }
            Self::ForbiddenCall { name } => {
                obj["call"] = serde_json::Value::String(name.clone());
            }
            _ => {}
        }
        obj
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        let v = Violation::ForbiddenSyntax {
            construct: "with statement".into(),
        };
        assert_eq!(v.code(), "FORBIDDEN_SYNTAX");

        let v = Violation::ForbiddenCall { name: "eval".into() };
        assert_eq!(v.code(), "FORBIDDEN_CALL");
    }

    #[test]
    fn display_names_the_construct() {
        let v = Violation::ForbiddenSyntax {
            construct: "import declaration".into(),
        };
        assert_eq!(v.to_string(), "forbidden syntax: import declaration");
    }

    #[test]
    fn structured_error_carries_call_name() {
        let v = Violation::ForbiddenCall { name: "open".into() };
        let json = v.to_structured_error();
        assert_eq!(json["code"], "FORBIDDEN_CALL");
        assert_eq!(json["call"], "open");
        assert!(json["message"].as_str().unwrap().contains("open"));
    }

    #[test]
    fn structured_error_carries_construct() {
        let v = Violation::ForbiddenSyntax {
            construct: "with statement".into(),
        };
        let json = v.to_structured_error();
        assert_eq!(json["construct"], "with statement");
    }
}
