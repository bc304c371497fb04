//! Validation helpers for DTOs.

use validator::ValidationError;

use crate::state::registry::RoomCode;

/// Longest accepted display name, in characters.
pub const MAX_DISPLAY_NAME_CHARS: usize = 24;

/// Validates that a display name has 1 to 24 characters once trimmed.
///
/// # Examples
///
/// ```ignore
/// validate_display_name("Ada")     // Ok
/// validate_display_name("   ")     // Err - blank
/// ```
pub fn validate_display_name(name: &str) -> Result<(), ValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        let mut err = ValidationError::new("display_name_blank");
        err.message = Some("Display name must not be blank".into());
        return Err(err);
    }

    let count = trimmed.chars().count();
    if count > MAX_DISPLAY_NAME_CHARS {
        let mut err = ValidationError::new("display_name_length");
        err.message = Some(
            format!("Display name must be at most {MAX_DISPLAY_NAME_CHARS} characters (got {count})")
                .into(),
        );
        return Err(err);
    }

    if trimmed.chars().any(char::is_control) {
        let mut err = ValidationError::new("display_name_format");
        err.message = Some("Display name must not contain control characters".into());
        return Err(err);
    }

    Ok(())
}

/// Validates that a room code is 6 characters of the room code alphabet, ignoring case.
pub fn validate_room_code(code: &str) -> Result<(), ValidationError> {
    if RoomCode::parse(code).is_none() {
        let mut err = ValidationError::new("room_code_format");
        err.message = Some("Room code must be 6 characters without 0, O, 1 or I".into());
        return Err(err);
    }
    Ok(())
}
