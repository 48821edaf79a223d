use serde_json::Value;
use thiserror::Error;
use tracing::warn;

pub const REQUIRED_KEYS: [&str; 4] = ["asin", "identifiers", "summaries", "vendorDetails"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaViolation {
    #[error("payload is not a JSON object")]
    NotAnObject,

    #[error("missing required keys: {}", .0.join(", "))]
    MissingKeys(Vec<&'static str>),
}

/// Presence-only check of the top-level keys. Value types and nested
/// structure are left alone.
pub fn check(payload: &Value) -> Result<(), SchemaViolation> {
    let object = payload.as_object().ok_or(SchemaViolation::NotAnObject)?;

    let missing: Vec<&'static str> = REQUIRED_KEYS
        .into_iter()
        .filter(|key| !object.contains_key(*key))
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(SchemaViolation::MissingKeys(missing))
    }
}

/// Storage gate: true when the payload may be written. Logs the violation otherwise.
pub fn validate(payload: &Value) -> bool {
    match check(payload) {
        Ok(()) => true,
        Err(violation) => {
            warn!(%violation, "JSON validation error");
            false
        }
    }
}
