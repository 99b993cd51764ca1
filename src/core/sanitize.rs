//! Argument sanitization for logs and wrapped errors
//!
//! Oversized string and byte arguments are cut before they are written to a log
//! line or stored in a [`QueryError`](super::error::QueryError).

use super::value::DatabaseValue;

/// Maximum characters kept from a string argument
pub const SANITIZE_STRING_LENGTH: usize = 64;

/// Maximum bytes kept from a binary argument
pub const SANITIZE_BYTES_LENGTH: usize = 64;

/// Marker appended to truncated values
pub const SANITIZED_SUFFIX: &str = "[truncated]";

/// Truncate a string longer than [`SANITIZE_STRING_LENGTH`] characters
pub fn sanitize_string(val: &str) -> String {
    match val.char_indices().nth(SANITIZE_STRING_LENGTH) {
        Some((cut, _)) => format!("{}{}", &val[..cut], SANITIZED_SUFFIX),
        None => val.to_string(),
    }
}

/// Truncate a byte slice longer than [`SANITIZE_BYTES_LENGTH`] bytes
pub fn sanitize_bytes(val: &[u8]) -> Vec<u8> {
    if val.len() > SANITIZE_BYTES_LENGTH {
        let mut out = Vec::with_capacity(SANITIZE_BYTES_LENGTH + SANITIZED_SUFFIX.len());
        out.extend_from_slice(&val[..SANITIZE_BYTES_LENGTH]);
        out.extend_from_slice(SANITIZED_SUFFIX.as_bytes());
        out
    } else {
        val.to_vec()
    }
}

/// Sanitize a single argument; non string/bytes values pass through
pub fn sanitize_value(value: &DatabaseValue) -> DatabaseValue {
    match value {
        DatabaseValue::String(s) => DatabaseValue::String(sanitize_string(s)),
        DatabaseValue::Bytes(b) => DatabaseValue::Bytes(sanitize_bytes(b)),
        other => other.clone(),
    }
}

/// Sanitize every argument of a statement
pub fn sanitize_args(args: &[DatabaseValue]) -> Vec<DatabaseValue> {
    args.iter().map(sanitize_value).collect()
}
