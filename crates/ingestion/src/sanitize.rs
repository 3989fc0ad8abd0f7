//! Free-text field sanitizing
//!
//! Applied to every payload field that ends up in a sink or a log line.

use std::fmt::Display;

/// Default maximum field length in characters
pub const DEFAULT_MAX_FIELD_LENGTH: usize = 500;

/// Stringify `field`, drop ASCII control characters (0x00-0x1F, 0x7F) and
/// truncate to `max_length` characters.
pub fn sanitize_field(field: impl Display, max_length: usize) -> String {
    field
        .to_string()
        .chars()
        .filter(|c| !c.is_ascii_control())
        .take(max_length)
        .collect()
}

/// [`sanitize_field`] with [`DEFAULT_MAX_FIELD_LENGTH`]
pub fn sanitize(field: impl Display) -> String {
    sanitize_field(field, DEFAULT_MAX_FIELD_LENGTH)
}
