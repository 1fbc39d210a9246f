// One binary codec for everything that lands on disk: store rows and the
// keystore file. Decoding insists on consuming the whole value, so a
// truncated or padded row surfaces as an error instead of garbage.

use crate::error::{NodeError, Result};
use serde::{Deserialize, Serialize};

pub fn serialize<T: Serialize + bincode::Encode>(value: &T) -> Result<Vec<u8>> {
    bincode::encode_to_vec(value, bincode::config::standard())
        .map_err(|e| NodeError::Serialization(format!("Could not encode value: {e}")))
}

pub fn deserialize<T>(bytes: &[u8]) -> Result<T>
where
    T: for<'de> Deserialize<'de> + bincode::Decode<()>,
{
    let (value, consumed) = bincode::decode_from_slice(bytes, bincode::config::standard())
        .map_err(|e| NodeError::Serialization(format!("Could not decode value: {e}")))?;
    if consumed != bytes.len() {
        return Err(NodeError::Serialization(format!(
            "Trailing bytes after value: {} of {} consumed",
            consumed,
            bytes.len()
        )));
    }
    Ok(value)
}
