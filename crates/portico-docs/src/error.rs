//! Error types for documentation handling.

use thiserror::Error;

/// Errors raised while rewriting or generating documentation.
#[derive(Debug, Error)]
pub enum DocsError {
    /// The body was not valid UTF-8.
    #[error("Document is not valid UTF-8")]
    NotUtf8,

    /// The body was not valid JSON.
    #[error("Failed to parse document: {0}")]
    Parse(#[source] serde_json::Error),

    /// The rewritten document could not be serialized.
    #[error("Failed to serialize document: {0}")]
    Serialization(#[source] serde_json::Error),

    /// The document root was not a JSON object.
    #[error("Document root is not an object")]
    NotAnObject,

    /// The document has no `components` object to attach the scheme to.
    #[error("Document has no components section")]
    MissingComponents,

    /// A field had an unexpected JSON type.
    #[error("Field '{field}' must be {expected}")]
    InvalidShape {
        /// The offending field.
        field: &'static str,
        /// The expected JSON type.
        expected: &'static str,
    },
}

/// Result type for documentation operations.
pub type DocsResult<T> = Result<T, DocsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_display() {
        let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = DocsError::Parse(source);
        assert!(err.to_string().starts_with("Failed to parse document"));
    }

    #[test]
    fn test_invalid_shape_display() {
        let err = DocsError::InvalidShape {
            field: "servers",
            expected: "an array",
        };
        assert_eq!(err.to_string(), "Field 'servers' must be an array");
    }
}
