//! Binary encoding for the records the store persists.
//!
//! Payloads, structures, and actions are serialized with bincode. A
//! zero-length blob is never a valid record: journals use it as the
//! "exists but empty" sentinel, so both directions reject it.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::TypeError;

/// Serialize a record for storage.
pub fn encode_record<T: Serialize>(record: &T) -> Result<Vec<u8>, TypeError> {
    let bytes = bincode::serialize(record).map_err(|e| TypeError::Serialization(e.to_string()))?;
    if bytes.is_empty() {
        return Err(TypeError::EmptyRecord);
    }
    Ok(bytes)
}

/// Deserialize a stored record.
pub fn decode_record<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, TypeError> {
    if bytes.is_empty() {
        return Err(TypeError::EmptyRecord);
    }
    bincode::deserialize(bytes).map_err(|e| TypeError::Serialization(e.to_string()))
}
