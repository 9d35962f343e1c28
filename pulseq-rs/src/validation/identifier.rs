//! Types and functions related to validating variable and channel identifiers
use once_cell::sync::Lazy;
use regex::Regex;

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum IdentifierValidationError {
    #[error("{0:?} is not a valid identifier")]
    Invalid(String),
}

/// A regex that matches only valid identifiers
static IDENTIFIER_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("regex should be valid"));

/// Returns an error if the given identifier is not a valid identifier
pub fn validate_identifier(ident: &str) -> Result<(), IdentifierValidationError> {
    if IDENTIFIER_REGEX.is_match(ident) {
        Ok(())
    } else {
        Err(IdentifierValidationError::Invalid(ident.to_string()))
    }
}
