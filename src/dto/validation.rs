//! Validation helpers for DTOs.

use validator::ValidationError;

/// Rejects text made only of whitespace.
///
/// Length limits are declared on the fields themselves; this only catches input that would pass
/// a `min = 1` check while carrying nothing to judge.
pub fn validate_not_blank(text: &str) -> Result<(), ValidationError> {
    if text.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("must contain at least one visible character".into());
        return Err(err);
    }
    Ok(())
}

/// Validates an opaque player identifier (a UUID rendered as text).
pub fn validate_player_id(id: &str) -> Result<(), ValidationError> {
    if id.is_empty() || id.len() > 64 || id.chars().any(char::is_whitespace) {
        let mut err = ValidationError::new("player_id_format");
        err.message = Some(format!("`{id}` is not a valid player id").into());
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_text_is_rejected() {
        assert!(validate_not_blank("hide in the vents").is_ok());
        assert!(validate_not_blank("").is_err());
        assert!(validate_not_blank("  \n\t").is_err());
    }

    #[test]
    fn player_ids() {
        assert!(validate_player_id("2f1c3a9e-8d8b-4c3e-9a55-0e4b7e0f6d21").is_ok());
        assert!(validate_player_id("").is_err());
        assert!(validate_player_id("has space").is_err());
    }
}
