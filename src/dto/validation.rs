//! Validation helpers for DTOs.

use validator::ValidationError;

const MAX_DISPLAY_NAME_CHARS: usize = 32;

/// Validates a participant display name: non-blank and at most 32 characters.
pub fn validate_display_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        let mut err = ValidationError::new("display_name_blank");
        err.message = Some("display name must not be empty".into());
        return Err(err);
    }

    if name.chars().count() > MAX_DISPLAY_NAME_CHARS {
        let mut err = ValidationError::new("display_name_length");
        err.message = Some(
            format!("display name must be at most {MAX_DISPLAY_NAME_CHARS} characters").into(),
        );
        return Err(err);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_ordinary_names() {
        assert!(validate_display_name("Ada").is_ok());
        assert!(validate_display_name("Grace Hopper").is_ok());
        assert!(validate_display_name("学生一号").is_ok());
    }

    #[test]
    fn rejects_blank_names() {
        assert!(validate_display_name("").is_err());
        assert!(validate_display_name("   ").is_err());
        assert!(validate_display_name("\t\n").is_err());
    }

    #[test]
    fn rejects_overlong_names() {
        let long = "x".repeat(MAX_DISPLAY_NAME_CHARS + 1);
        assert!(validate_display_name(&long).is_err());
        let exact = "x".repeat(MAX_DISPLAY_NAME_CHARS);
        assert!(validate_display_name(&exact).is_ok());
    }
}
