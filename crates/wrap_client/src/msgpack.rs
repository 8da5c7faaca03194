//! Compact binary map encoding used across the call boundary.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{InvokeError, Result};

/// Encode `value` as a msgpack map (struct fields by name).
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    rmp_serde::to_vec_named(value).map_err(|e| InvokeError::Serialization(e.to_string()))
}

pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    rmp_serde::from_slice(bytes).map_err(|e| InvokeError::Serialization(e.to_string()))
}
