//! Response body formatting

use serde_json::Value;

use crate::{Error, Result};

/// Printed for a successful response without a body
pub const NO_CONTENT_MESSAGE: &str = "Request succeeded (no content).";

/// Render a successful response body for the terminal.
///
/// Bodies starting with `{` or `[` must be valid JSON and are pretty-printed;
/// anything else is returned trimmed.
pub fn format_body(raw: &str) -> Result<String> {
    let trimmed = raw.trim();

    match trimmed.chars().next() {
        None => Ok(NO_CONTENT_MESSAGE.to_string()),
        Some('{' | '[') => {
            let value: Value = serde_json::from_str(trimmed).map_err(Error::Format)?;
            Ok(serde_json::to_string_pretty(&value)?)
        }
        Some(_) => Ok(trimmed.to_string()),
    }
}
