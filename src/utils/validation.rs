//! Input validation primitives.
//!
//! These replace verbose ok_or_else + Error::validation_* chains in the
//! command layer.

use crate::error::{Error, Result};

/// Require an Option to contain a value.
///
/// ```ignore
/// let yaml = validation::require(args.yaml, "yaml", "Pass a stack file with -f")?;
/// ```
pub fn require<T>(opt: Option<T>, field: &str, message: &str) -> Result<T> {
    opt.ok_or_else(|| {
        Error::validation_missing_argument(vec![field.to_string()]).with_hint(message)
    })
}

/// Require a string to be non-empty after trimming.
///
/// Returns a reference to the trimmed string on success.
pub fn require_non_empty<'a>(value: &'a str, field: &str, message: &str) -> Result<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(Error::validation_invalid_argument(field, message, None, None))
    } else {
        Ok(trimmed)
    }
}
