//! Request validation utilities.

use crate::types::{Error, Result};

/// Validate that a reference field is not empty or whitespace.
pub fn validate_non_empty(s: &str, field: &str) -> Result<()> {
    if s.trim().is_empty() {
        return Err(Error::validation(format!("{} cannot be empty", field)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_empty_and_whitespace() {
        assert!(validate_non_empty("@toolhost/hello", "packageName").is_ok());
        assert!(validate_non_empty("", "packageName").is_err());
        let err = validate_non_empty("   ", "exportName").unwrap_err();
        assert!(err.to_string().contains("exportName cannot be empty"));
    }
}
