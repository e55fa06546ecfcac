//! Validation helpers for DTOs.

use validator::ValidationError;

/// Message returned whenever a user identifier is missing or blank.
pub const USER_ID_REQUIRED: &str = "User ID is required";

/// Rejects identifiers made only of whitespace.
pub fn validate_user_id(id: &str) -> Result<(), ValidationError> {
    if id.trim().is_empty() {
        let mut err = ValidationError::new("user_id_blank");
        err.message = Some(USER_ID_REQUIRED.into());
        return Err(err);
    }
    Ok(())
}
