//! Field validation shared by the domain types.

use thiserror::Error;

/// Characters that the line-oriented text database reserves.
const RESERVED: [char; 4] = ['|', '^', '\n', '\r'];

/// Errors raised when domain input is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{0} must not be empty")]
    Empty(&'static str),

    #[error("{field} must not contain '|', '^' or line breaks")]
    Unstorable { field: &'static str },

    #[error("Unknown {kind}: {value}")]
    UnknownValue { kind: &'static str, value: String },

    #[error("Invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Reject values the text database cannot round-trip.
///
/// # Errors
/// Returns [`ValidationError::Unstorable`] if a reserved character is present.
pub fn ensure_storable(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.contains(RESERVED) {
        return Err(ValidationError::Unstorable { field });
    }
    Ok(())
}

/// Reject identifiers other than ASCII letters, digits, `-` and `_`.
///
/// Hospital IDs are embedded in `;`, `,` and `:` separated sub-fields of the
/// text database, so they get a narrower alphabet than free text.
///
/// # Errors
/// Returns [`ValidationError::Invalid`] naming the first offending character.
pub fn ensure_identifier(field: &'static str, value: &str) -> Result<(), ValidationError> {
    match value
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_')))
    {
        Some(c) => Err(ValidationError::Invalid {
            field,
            reason: format!("'{}' is not allowed; use letters, digits, '-' or '_'", c.escape_default()),
        }),
        None => Ok(()),
    }
}

/// Reject empty or whitespace-only values.
///
/// # Errors
/// Returns [`ValidationError::Empty`] for blank input.
pub fn ensure_non_empty(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::Empty(field));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_characters() {
        assert!(ensure_storable("name", "Dr. Who").is_ok());
        assert!(ensure_storable("name", "a|b").is_err());
        assert!(ensure_storable("name", "a^b").is_err());
        assert!(ensure_storable("name", "line\nbreak").is_err());
    }

    #[test]
    fn test_non_empty() {
        assert_eq!(ensure_non_empty("name", "  "), Err(ValidationError::Empty("name")));
        assert!(ensure_non_empty("name", "x").is_ok());
    }

    #[test]
    fn test_identifier_alphabet() {
        assert!(ensure_identifier("hospital ID", "PH-001_b").is_ok());
        for bad in ["PH;1", "D,1", "P:1", "P 1", "Pé1"] {
            assert!(
                matches!(
                    ensure_identifier("hospital ID", bad),
                    Err(ValidationError::Invalid { field: "hospital ID", .. })
                ),
                "{bad} should be rejected"
            );
        }
    }
}
