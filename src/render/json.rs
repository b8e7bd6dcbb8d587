use serde::Serialize;

use crate::error::DrugBriefError;

pub fn to_pretty<T: Serialize>(value: &T) -> Result<String, DrugBriefError> {
    Ok(serde_json::to_string_pretty(value)?)
}

/// `{ "error": ... }`, the JSON shape of a terminal error.
pub fn error_pretty(message: &str) -> Result<String, DrugBriefError> {
    to_pretty(&serde_json::json!({ "error": message }))
}
