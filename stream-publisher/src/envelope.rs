use serde::Deserialize;

use crate::error::PublishError;

/// The one field a relay envelope must carry. Everything else in the payload
/// passes through to the broker untouched.
#[derive(Debug, Deserialize)]
pub struct StreamEnvelope {
    #[serde(rename = "Id")]
    pub id: String,
}

impl StreamEnvelope {
    /// Extracts the partition key from raw envelope bytes. Fails before any
    /// broker interaction when the bytes are not JSON or `Id` is absent or
    /// not a string.
    pub fn partition_key(raw: &[u8]) -> Result<String, PublishError> {
        let envelope: StreamEnvelope = serde_json::from_slice(raw)?;
        Ok(envelope.id)
    }
}
