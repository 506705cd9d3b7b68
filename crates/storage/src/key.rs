//! Key validation.
//!
//! Keys become file names in the local backend, so they are restricted to a
//! conservative character set and may never contain path separators.

use crate::error::{ErrorKind, Result};

const MAX_KEY_LENGTH: usize = 255;

/// Validates a storage key for security and correctness.
///
/// Accepts ASCII alphanumerics, `-`, `_` and `.`; rejects empty keys, keys
/// longer than 255 bytes and keys starting with `.` (reserved for temporary
/// files).
///
/// # Examples
///
/// ```
/// use coffer_storage::validate_key;
/// assert!(validate_key("9f86d081884c7d659a2feaa0c55ad015").is_ok());
/// assert!(validate_key("snapshot-01.json").is_ok());
/// assert!(validate_key("../etc/passwd").is_err());
/// assert!(validate_key(".hidden").is_err());
/// assert!(validate_key("").is_err());
/// ```
pub fn validate(key: &str) -> Result<&str> {
    let valid = !key.is_empty()
        && key.len() <= MAX_KEY_LENGTH
        && !key.starts_with('.')
        && key.bytes().all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'));
    match valid {
        true => Ok(key),
        false => exn::bail!(ErrorKind::InvalidKey(key.to_string())),
    }
}
