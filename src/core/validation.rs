//! Validation utilities for configuration values
//!
//! Provides the shared `ValidationError` type and the range and name
//! checks used by queue options and the command line.

use crate::core::error_handling::ContextualError;
use std::fmt;

/// A configuration value failed validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    message: String,
}

impl ValidationError {
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ValidationError {}

impl ContextualError for ValidationError {
    fn is_user_actionable(&self) -> bool {
        true
    }

    fn user_message(&self) -> Option<&str> {
        Some(&self.message)
    }
}

/// Validate that `value` lies within the inclusive range `[min, max]`
pub fn validate_range(name: &str, value: usize, min: usize, max: usize) -> Result<usize, ValidationError> {
    if value < min || value > max {
        return Err(ValidationError::new(&format!(
            "{} must be between {} and {} (got {})",
            name, min, max, value
        )));
    }
    Ok(value)
}

/// Validate positive integer value
pub fn validate_positive_int(value: &str) -> Result<usize, String> {
    match value.parse::<usize>() {
        Ok(0) => Err("Value must be greater than 0".to_string()),
        Ok(n) => Ok(n),
        Err(_) => Err(format!("'{}' is not a valid positive integer", value)),
    }
}

/// Normalise an optional name: surrounding whitespace is trimmed and an
/// empty result becomes `None`
pub fn normalize_name(name: Option<&str>) -> Option<String> {
    name.map(str::trim)
        .filter(|trimmed| !trimmed.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_range() {
        assert_eq!(validate_range("threads", 1, 1, 4).unwrap(), 1);
        assert_eq!(validate_range("threads", 4, 1, 4).unwrap(), 4);

        let err = validate_range("threads", 5, 1, 4).unwrap_err();
        assert_eq!(err.message(), "threads must be between 1 and 4 (got 5)");
        assert!(validate_range("threads", 0, 1, 4).is_err());
    }

    #[test]
    fn test_validate_positive_int() {
        assert_eq!(validate_positive_int("12"), Ok(12));
        assert!(validate_positive_int("0").is_err());
        assert!(validate_positive_int("-3").is_err());
        assert!(validate_positive_int("abc").is_err());
    }

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name(Some("  jobs ")), Some("jobs".to_string()));
        assert_eq!(normalize_name(Some("   ")), None);
        assert_eq!(normalize_name(Some("")), None);
        assert_eq!(normalize_name(None), None);
    }

    #[test]
    fn test_validation_error_is_user_actionable() {
        let err = ValidationError::new("bad value");
        assert!(err.is_user_actionable());
        assert_eq!(err.user_message(), Some("bad value"));
        assert_eq!(err.to_string(), "bad value");
    }
}
