//! Error types for parsing in resync-types.

use thiserror::Error;

/// Errors that can occur when parsing resync values from text.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ParseError {
    /// The text does not name a known variant.
    #[error("Unknown {kind}: '{value}'")]
    UnknownVariant {
        /// What was being parsed (e.g. "priority").
        kind: &'static str,
        /// The rejected input.
        value: String,
    },
}

/// Result type alias using resync-types' ParseError type.
pub type ParseResult<T> = std::result::Result<T, ParseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_variant_display() {
        let err = ParseError::UnknownVariant {
            kind: "priority",
            value: "urgent".to_string(),
        };
        assert_eq!(err.to_string(), "Unknown priority: 'urgent'");
    }
}
