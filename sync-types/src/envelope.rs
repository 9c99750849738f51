//! EncryptedEnvelope - the opaque unit exchanged with every backend.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::SyncError;

/// AEAD cipher identifier carried in every envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Algorithm {
    /// AES-256 in Galois/Counter Mode with a 96-bit IV and 128-bit tag.
    #[serde(rename = "AES-256-GCM")]
    Aes256Gcm,
}

impl Algorithm {
    /// Wire identifier of the algorithm.
    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::Aes256Gcm => "AES-256-GCM",
        }
    }

    /// Required IV length in bytes.
    pub fn iv_len(&self) -> usize {
        match self {
            Algorithm::Aes256Gcm => 12,
        }
    }

    /// Required authentication tag length in bytes.
    pub fn tag_len(&self) -> usize {
        match self {
            Algorithm::Aes256Gcm => 16,
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unauthenticated facts about the plaintext, recorded at encryption time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvelopeMetadata {
    /// Plaintext length in bytes.
    pub original_size: u64,
    /// Unix timestamp (milliseconds) of encryption.
    pub timestamp: u64,
    /// Hex SHA-256 of the plaintext. `None` means it was never computed,
    /// in which case decryption skips the post-decrypt comparison.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

/// The self-describing encrypted unit stored by backends.
///
/// Meaningless without the key matching `key_version`. Backends persist it
/// as JSON with base64 byte fields and never look inside.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedEnvelope {
    /// Ciphertext without the authentication tag.
    #[serde(with = "b64")]
    pub encrypted_payload: Vec<u8>,
    /// Per-encryption random IV.
    #[serde(with = "b64")]
    pub iv: Vec<u8>,
    /// AEAD authentication tag.
    #[serde(with = "b64")]
    pub auth_tag: Vec<u8>,
    /// Cipher used to produce this envelope.
    pub algorithm: Algorithm,
    /// Version of the key that encrypted this envelope.
    pub key_version: u32,
    /// Size, timestamp and checksum of the plaintext.
    pub metadata: EnvelopeMetadata,
}

impl EncryptedEnvelope {
    /// Check IV and tag lengths against the declared algorithm.
    pub fn check_shape(&self) -> Result<(), SyncError> {
        if self.iv.len() != self.algorithm.iv_len() {
            return Err(SyncError::InvalidData(format!(
                "iv is {} bytes, {} requires {}",
                self.iv.len(),
                self.algorithm,
                self.algorithm.iv_len()
            )));
        }
        if self.auth_tag.len() != self.algorithm.tag_len() {
            return Err(SyncError::InvalidData(format!(
                "auth tag is {} bytes, {} requires {}",
                self.auth_tag.len(),
                self.algorithm,
                self.algorithm.tag_len()
            )));
        }
        Ok(())
    }

    /// Bytes this envelope occupies on a backend (ciphertext + iv + tag).
    pub fn stored_size(&self) -> u64 {
        (self.encrypted_payload.len() + self.iv.len() + self.auth_tag.len()) as u64
    }

    /// Serialize to the JSON wire shape.
    pub fn to_json(&self) -> Result<String, SyncError> {
        serde_json::to_string(self).map_err(SyncError::Serialization)
    }

    /// Parse from the JSON wire shape.
    pub fn from_json(json: &str) -> Result<Self, SyncError> {
        serde_json::from_str(json).map_err(SyncError::Serialization)
    }
}

impl fmt::Debug for EncryptedEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptedEnvelope")
            .field(
                "encrypted_payload",
                &format!("[{} bytes]", self.encrypted_payload.len()),
            )
            .field("algorithm", &self.algorithm)
            .field("key_version", &self.key_version)
            .field("metadata", &self.metadata)
            .finish()
    }
}

/// Standard base64 for byte fields on the wire.
mod b64 {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> EncryptedEnvelope {
        EncryptedEnvelope {
            encrypted_payload: vec![1, 2, 3, 4],
            iv: vec![0u8; 12],
            auth_tag: vec![9u8; 16],
            algorithm: Algorithm::Aes256Gcm,
            key_version: 1,
            metadata: EnvelopeMetadata {
                original_size: 4,
                timestamp: 1_705_000_000_000,
                checksum: Some("ab".repeat(32)),
            },
        }
    }

    #[test]
    fn wire_shape_uses_camel_case_and_base64() {
        let json: serde_json::Value = serde_json::from_str(&sample().to_json().unwrap()).unwrap();

        assert_eq!(json["encryptedPayload"], "AQIDBA==");
        assert_eq!(json["algorithm"], "AES-256-GCM");
        assert_eq!(json["keyVersion"], 1);
        assert_eq!(json["metadata"]["originalSize"], 4);
        assert!(json["authTag"].is_string());
    }

    #[test]
    fn json_roundtrip_preserves_bytes() {
        let envelope = sample();
        let restored = EncryptedEnvelope::from_json(&envelope.to_json().unwrap()).unwrap();
        assert_eq!(envelope, restored);
    }

    #[test]
    fn absent_checksum_is_omitted() {
        let mut envelope = sample();
        envelope.metadata.checksum = None;
        let json = envelope.to_json().unwrap();
        assert!(!json.contains("checksum"));

        let restored = EncryptedEnvelope::from_json(&json).unwrap();
        assert!(restored.metadata.checksum.is_none());
    }

    #[test]
    fn unknown_algorithm_is_rejected() {
        let json = sample().to_json().unwrap().replace("AES-256-GCM", "ROT13");
        assert!(EncryptedEnvelope::from_json(&json).is_err());
    }

    #[test]
    fn invalid_base64_is_rejected() {
        let json = sample().to_json().unwrap().replace("AQIDBA==", "not base64!");
        assert!(EncryptedEnvelope::from_json(&json).is_err());
    }

    #[test]
    fn check_shape_rejects_short_iv() {
        let mut envelope = sample();
        envelope.iv.pop();
        assert!(envelope.check_shape().is_err());
    }

    #[test]
    fn check_shape_rejects_long_tag() {
        let mut envelope = sample();
        envelope.auth_tag.push(0);
        assert!(envelope.check_shape().is_err());
    }

    #[test]
    fn stored_size_counts_all_byte_fields() {
        assert_eq!(sample().stored_size(), 4 + 12 + 16);
    }

    #[test]
    fn debug_hides_ciphertext_bytes() {
        let debug = format!("{:?}", sample());
        assert!(debug.contains("[4 bytes]"));
    }
}
