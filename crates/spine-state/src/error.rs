//! Error types for spine-state operations.

use crate::Path;
use thiserror::Error;

/// Result type alias for spine-state operations.
pub type SpineResult<T> = Result<T, SpineError>;

/// Errors that can occur during spine-state operations.
#[derive(Debug, Error)]
pub enum SpineError {
    /// The producer was handed a root it cannot draft.
    #[error("invalid root type: expected record, list, map, set, null or undefined, found {found}")]
    InvalidRootType {
        /// Type name of the rejected root.
        found: &'static str,
    },

    /// A typed draft operation was used on a node of another kind.
    #[error("type mismatch at {path}: expected {expected}, found {found}")]
    TypeMismatch {
        /// The draft path where the mismatch occurred.
        path: Path,
        /// The expected type.
        expected: &'static str,
        /// The actual type found.
        found: &'static str,
    },

    /// A date operation produced an instant that cannot be represented.
    #[error("invalid date at {path}: {reason}")]
    InvalidDate {
        /// The draft path of the date.
        path: Path,
        /// Which component was out of range.
        reason: String,
    },

    /// JSON serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SpineError {
    /// Create an invalid root type error.
    #[inline]
    pub fn invalid_root_type(found: &'static str) -> Self {
        SpineError::InvalidRootType { found }
    }

    /// Create a type mismatch error.
    #[inline]
    pub fn type_mismatch(path: Path, expected: &'static str, found: &'static str) -> Self {
        SpineError::TypeMismatch {
            path,
            expected,
            found,
        }
    }

    /// Create an invalid date error.
    #[inline]
    pub fn invalid_date(path: Path, reason: impl Into<String>) -> Self {
        SpineError::InvalidDate {
            path,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path;

    #[test]
    fn test_error_display() {
        let err = SpineError::invalid_root_type("number");
        assert!(err.to_string().contains("found number"));

        let err = SpineError::type_mismatch(path!("tags"), "set", "list");
        assert_eq!(err.to_string(), "type mismatch at $.tags: expected set, found list");
    }

    #[test]
    fn test_serialization_error_converts() {
        let parse = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: SpineError = parse.into();
        assert!(matches!(err, SpineError::Serialization(_)));
    }
}
