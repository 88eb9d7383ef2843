//! Input validation for values that end up in engine records.

/// Longest display name or description accepted, in UTF-16 code units
pub const MAX_DISPLAY_LEN: usize = 256;

/// Validates a display name shown by engine management tools.
///
/// # Errors
///
/// Returns `Err` if the name is empty or blank, too long, or contains
/// control characters.
pub fn validate_display_name(input: &str) -> Result<(), String> {
    if input.trim().is_empty() {
        return Err("Display name must not be empty".to_string());
    }
    validate_display_text(input)
}

/// Validates a description. Empty descriptions are allowed.
///
/// # Errors
///
/// Returns `Err` if the text is too long or contains control characters.
pub fn validate_display_text(input: &str) -> Result<(), String> {
    if input.encode_utf16().count() > MAX_DISPLAY_LEN {
        return Err(format!("Text too long (max {MAX_DISPLAY_LEN} characters)"));
    }
    if input.chars().any(char::is_control) {
        return Err("Text contains control characters".to_string());
    }
    Ok(())
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn test_printable_names_within_limit_accepted(name in "[a-zA-Z0-9][a-zA-Z0-9 ._-]{0,63}") {
            prop_assert!(validate_display_name(&name).is_ok());
        }

        #[test]
        fn test_any_control_char_rejected(
            prefix in "[a-z]{1,10}",
            control in "[\\x00-\\x1f\\x7f]"
        ) {
            let name = format!("{prefix}{control}");
            prop_assert!(validate_display_name(&name).is_err());
        }
    }
}
