//! Serde helpers for Graph API identifiers
//!
//! The Graph API returns ids as JSON strings in some responses and as
//! numbers in others (`user_id` on the token endpoint). Both are kept as
//! strings internally.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer};

/// Deserialize an optional id given as a string or a number.
pub fn opt_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<serde_json::Value>::deserialize(deserializer)? {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(s)) => Ok(Some(s)),
        Some(serde_json::Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(D::Error::custom(format!(
            "expected a string or numeric id, got {other}"
        ))),
    }
}
