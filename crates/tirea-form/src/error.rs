//! Error types for form engine operations.

use thiserror::Error;
use tirea_form_state::StateError;

/// Result type alias for form engine operations.
pub type FormResult<T> = Result<T, FormError>;

/// Errors surfaced by [`FormEngine`](crate::FormEngine).
///
/// Validation failures are never errors; they land in the error tree.
/// These variants only signal misuse.
#[derive(Debug, Error)]
pub enum FormError {
    /// A path string was malformed, or a structural edit hit a non-list.
    #[error(transparent)]
    State(#[from] StateError),

    /// A rule named a dependent path that could not be parsed.
    #[error("invalid dependency {dep:?} for {path}: {source}")]
    InvalidDependency {
        /// The path whose rules declared the dependency.
        path: String,
        /// The offending dependency.
        dep: String,
        /// Parse failure.
        #[source]
        source: StateError,
    },

    /// Async validation was requested after [`teardown`](crate::FormEngine::teardown).
    #[error("form engine has been torn down")]
    TornDown,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tirea_form_state::Path;

    #[test]
    fn test_malformed_path_converts() {
        let err: FormError = Path::parse("a..b").unwrap_err().into();
        assert!(matches!(err, FormError::State(StateError::MalformedPath { .. })));
        assert!(err.to_string().contains("malformed path"));
    }
}
