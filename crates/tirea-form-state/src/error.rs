//! Error types for tirea-form-state operations.

use crate::{Path, Tree};
use thiserror::Error;

/// Result type alias for tirea-form-state operations.
pub type StateResult<T> = Result<T, StateError>;

/// Errors that can occur while addressing or editing a tree.
///
/// Ordinary reads and writes never fail; these variants signal a caller
/// bug (a malformed path string, or a structural edit aimed at a value that
/// is not an array).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StateError {
    /// A path string could not be parsed.
    #[error("malformed path {input:?}: {reason}")]
    MalformedPath {
        /// The rejected input.
        input: String,
        /// What was wrong with it.
        reason: &'static str,
    },

    /// A path addresses a list slot beyond [`MAX_INDEX`](crate::MAX_INDEX).
    #[error("index {index} in path {input:?} exceeds the limit of {max}")]
    IndexTooLarge {
        /// The rejected input.
        input: String,
        /// The offending index, as written.
        index: String,
        /// The largest accepted index.
        max: usize,
    },

    /// Type mismatch when editing a value.
    #[error("type mismatch at {path}: expected {expected}, found {found}")]
    TypeMismatch {
        /// The path where the mismatch occurred.
        path: Path,
        /// The expected type.
        expected: &'static str,
        /// The actual type found.
        found: &'static str,
    },
}

impl StateError {
    /// Create a malformed path error.
    #[inline]
    pub fn malformed_path(input: impl Into<String>, reason: &'static str) -> Self {
        StateError::MalformedPath {
            input: input.into(),
            reason,
        }
    }

    /// Create an index-too-large error.
    #[inline]
    pub fn index_too_large(input: impl Into<String>, index: impl Into<String>) -> Self {
        StateError::IndexTooLarge {
            input: input.into(),
            index: index.into(),
            max: crate::MAX_INDEX,
        }
    }

    /// Create a type mismatch error.
    #[inline]
    pub fn type_mismatch(path: Path, expected: &'static str, found: &'static str) -> Self {
        StateError::TypeMismatch {
            path,
            expected,
            found,
        }
    }
}

/// Get the type name of a tree node.
#[inline]
pub fn value_type_name(v: &Tree) -> &'static str {
    match v {
        Tree::Null => "null",
        Tree::Bool(_) => "boolean",
        Tree::Number(_) => "number",
        Tree::String(_) => "string",
        Tree::List(_) => "array",
        Tree::Map(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path;
    use serde_json::json;

    #[test]
    fn test_error_display() {
        let err = StateError::type_mismatch(path!("users", 0), "array", "string");
        assert_eq!(
            err.to_string(),
            "type mismatch at $.users[0]: expected array, found string"
        );

        let err = StateError::malformed_path("a..b", "empty segment");
        assert!(err.to_string().contains("malformed path"));
    }

    #[test]
    fn test_value_type_name() {
        assert_eq!(value_type_name(&Tree::from(json!(null))), "null");
        assert_eq!(value_type_name(&Tree::from(json!(true))), "boolean");
        assert_eq!(value_type_name(&Tree::from(json!(42))), "number");
        assert_eq!(value_type_name(&Tree::from(json!("hello"))), "string");
        assert_eq!(value_type_name(&Tree::from(json!([1, 2, 3]))), "array");
        assert_eq!(value_type_name(&Tree::from(json!({"a": 1}))), "object");
    }
}
