//! Collection-name validation.
//!
//! A collection (a.k.a. index) name is 3–512 characters drawn from letters,
//! digits, `.`, `_` and `-`, and must start and end with a letter or digit.
//! Validation happens at the API boundary before any storage mutation, and
//! the error message names the specific rule that was violated.

use crate::{Error, Result};

pub const MIN_NAME_LEN: usize = 3;
pub const MAX_NAME_LEN: usize = 512;

pub fn validate_collection_name(name: &str) -> Result<()> {
    let len = name.chars().count();
    if len < MIN_NAME_LEN || len > MAX_NAME_LEN {
        return Err(Error::validation(format!(
            "index name '{name}' has length {len}, must be between {MIN_NAME_LEN} and {MAX_NAME_LEN} characters"
        )));
    }
    if let Some(bad) = name.chars().find(|c| !is_name_char(*c)) {
        return Err(Error::validation(format!(
            "index name '{name}' contains disallowed character '{bad}', only letters, digits, '.', '_' and '-' are allowed"
        )));
    }
    // len >= 3 guarantees both ends exist
    let first = name.chars().next().unwrap_or('-');
    let last = name.chars().last().unwrap_or('-');
    if !first.is_ascii_alphanumeric() || !last.is_ascii_alphanumeric() {
        return Err(Error::validation(format!(
            "index name '{name}' must start and end with a letter or digit"
        )));
    }
    Ok(())
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-'
}
