//! Value encoding for the store.

use linkedall_core::CacheResult;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// Encodes a value. In raw mode strings are stored verbatim and anything
/// else as its JSON text.
pub(crate) fn encode<T: Serialize + ?Sized>(value: &T, serialize: bool) -> CacheResult<String> {
    if serialize {
        return Ok(serde_json::to_string(value)?);
    }
    match serde_json::to_value(value)? {
        Value::String(raw) => Ok(raw),
        other => Ok(other.to_string()),
    }
}

/// Decodes a stored value. Empty payloads and JSON `null` read as absent.
pub(crate) fn decode<T: DeserializeOwned>(payload: String, serialize: bool) -> CacheResult<Option<T>> {
    if payload.is_empty() {
        return Ok(None);
    }
    if serialize {
        let value: Value = serde_json::from_str(&payload)?;
        if value.is_null() {
            return Ok(None);
        }
        return Ok(Some(serde_json::from_value(value)?));
    }
    match serde_json::from_value(Value::String(payload.clone())) {
        Ok(value) => Ok(Some(value)),
        Err(_) => Ok(Some(serde_json::from_str(&payload)?)),
    }
}
