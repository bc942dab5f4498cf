//! Cache entry encoding (CBOR).

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use serde::Serialize;
use serde::de::DeserializeOwned;

pub(crate) fn encode<T: Serialize>(key: &str, value: &T) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    ciborium::into_writer(value, &mut buffer).or_raise(|| ErrorKind::InvalidEntry(key.to_string()))?;
    Ok(buffer)
}

pub(crate) fn decode<T: DeserializeOwned>(key: &str, bytes: &[u8]) -> Result<T> {
    ciborium::from_reader(bytes).or_raise(|| ErrorKind::InvalidEntry(key.to_string()))
}
