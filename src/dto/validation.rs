//! Validation helpers for DTOs.

use validator::ValidationError;

/// Longest display name accepted, counted in characters after trimming.
pub const DISPLAY_NAME_MAX_CHARS: usize = 20;

/// Validates that a display name holds 1 to [`DISPLAY_NAME_MAX_CHARS`] characters once trimmed.
///
/// # Examples
///
/// ```ignore
/// validate_display_name("Ada")      // Ok
/// validate_display_name("   ")      // Err - blank
/// validate_display_name("x".repeat(21)) // Err - too long
/// ```
pub fn validate_display_name(name: &str) -> Result<(), ValidationError> {
    let length = name.trim().chars().count();
    if length == 0 {
        let mut err = ValidationError::new("display_name_blank");
        err.message = Some("Display name must not be blank".into());
        return Err(err);
    }

    if length > DISPLAY_NAME_MAX_CHARS {
        let mut err = ValidationError::new("display_name_length");
        err.message = Some(
            format!(
                "Display name must be at most {DISPLAY_NAME_MAX_CHARS} characters (got {length})"
            )
            .into(),
        );
        return Err(err);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_display_name_valid() {
        assert!(validate_display_name("Ada").is_ok());
        assert!(validate_display_name("  padded  ").is_ok());
        assert!(validate_display_name(&"x".repeat(20)).is_ok());
        // characters, not bytes
        assert!(validate_display_name(&"é".repeat(20)).is_ok());
    }

    #[test]
    fn test_validate_display_name_blank() {
        assert!(validate_display_name("").is_err());
        assert!(validate_display_name("   ").is_err());
    }

    #[test]
    fn test_validate_display_name_too_long() {
        let err = validate_display_name(&"x".repeat(21)).unwrap_err();
        assert_eq!(err.code, "display_name_length");
    }
}
