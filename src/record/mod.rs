//! Record Module
//!
//! One key, one JSON document, one in-memory handle.
//!
//! ## Responsibilities
//! - Load a key's document once, defaulting to `{}` when it is missing,
//!   unreadable or malformed
//! - Hold the value currently considered "current" for the key
//! - Write that value back to the key's document
//!
//! ## Document Encoding
//! Plain UTF-8 JSON. Pretty output uses two-space indentation. A document
//! containing `null` reads as `{}`, and `null` values are stored as `{}`:
//! a handle's value is never null.

mod handle;

pub use handle::RecordHandle;

use serde_json::{Map, Value};

use crate::error::Result;

/// The default value of every record
pub fn empty() -> Value {
    Value::Object(Map::new())
}

/// Replace `null` with `{}`
pub fn normalize(value: Value) -> Value {
    match value {
        Value::Null => empty(),
        other => other,
    }
}

/// Decode a document; `None` if it is not valid JSON
pub fn decode(bytes: &[u8]) -> Option<Value> {
    serde_json::from_slice::<Value>(bytes).ok().map(normalize)
}

/// Encode a value as a document
pub fn encode(value: &Value, pretty: bool) -> Result<Vec<u8>> {
    let bytes = if pretty {
        serde_json::to_vec_pretty(value)?
    } else {
        serde_json::to_vec(value)?
    };
    Ok(bytes)
}
