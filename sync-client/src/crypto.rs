//! Encryption service for locksync.
//!
//! This module provides:
//! - Argon2id passphrase key derivation with a persisted random salt
//! - AES-256-GCM envelopes with a fresh 96-bit IV per call
//! - A versioned key ring so rotation never strands old envelopes
//! - Explicit destruction that zeroes all key bytes
//!
//! # Security Notes
//!
//! - The algorithm id, key version and plaintext metadata are bound as
//!   associated data. Relabelling any of them fails the tag check.
//! - Decryption fails closed. A tag mismatch never yields plaintext.
//! - Retired keys are only ever used for decryption.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{PoisonError, RwLock};

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce,
};
use argon2::{Argon2, Params, Version};
use locksync_types::{now_millis, Algorithm, EncryptedEnvelope, EnvelopeMetadata};
use serde::{de::DeserializeOwned, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Key size for AES-256 (256 bits = 32 bytes).
pub const KEY_SIZE: usize = 32;

/// IV size for AES-GCM (96 bits = 12 bytes).
pub const IV_SIZE: usize = 12;

/// Authentication tag size (128 bits = 16 bytes).
pub const TAG_SIZE: usize = 16;

/// Salt size for key derivation.
pub const SALT_SIZE: usize = 16;

/// Shortest passphrase accepted, in characters.
pub const MIN_PASSPHRASE_CHARS: usize = 8;

/// Crypto errors.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Passphrase too short; rejected before any derivation work.
    #[error("passphrase must be at least {min} characters")]
    WeakPassphrase {
        /// Minimum length in characters.
        min: usize,
    },

    /// Key derivation failed.
    #[error("key derivation failed: {0}")]
    KeyDerivationFailed(String),

    /// Encryption failed.
    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    /// Decryption failed (tampering or wrong key).
    #[error("decryption failed: authentication error")]
    DecryptionFailed,

    /// Decrypted bytes do not match the recorded checksum.
    #[error("decrypted payload does not match its checksum")]
    ChecksumMismatch,

    /// No key with this version is held.
    #[error("unknown key version {0}")]
    UnknownKeyVersion(u32),

    /// Envelope fields have the wrong shape for their algorithm.
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// Restore was called without any key.
    #[error("key history is empty")]
    EmptyKeyHistory,

    /// Salt text could not be decoded.
    #[error("invalid salt: {0}")]
    InvalidSalt(String),

    /// The passphrase derived a key that does not match the recorded key check.
    #[error("passphrase does not match key version {0}")]
    WrongPassphrase(u32),

    /// The service was destroyed and can no longer be used.
    #[error("encryption service has been destroyed")]
    ServiceDestroyed,

    /// Typed payload (de)serialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Argon2id cost parameters.
///
/// Recorded next to the salt so a key can be re-derived later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    memory_kib: u32,
    iterations: u32,
    parallelism: u32,
}

impl KdfParams {
    /// Create parameters.
    pub fn new(memory_kib: u32, iterations: u32, parallelism: u32) -> Self {
        Self {
            memory_kib,
            iterations,
            parallelism,
        }
    }

    /// Memory cost in KiB.
    pub fn memory_kib(&self) -> u32 {
        self.memory_kib
    }

    /// Iteration count.
    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    /// Lane count.
    pub fn parallelism(&self) -> u32 {
        self.parallelism
    }

    fn to_argon2_params(self) -> Result<Params, CryptoError> {
        Params::new(
            self.memory_kib,
            self.iterations,
            self.parallelism,
            Some(KEY_SIZE),
        )
        .map_err(|e| CryptoError::KeyDerivationFailed(e.to_string()))
    }
}

impl Default for KdfParams {
    /// 64 MiB, 3 iterations, 1 lane.
    fn default() -> Self {
        Self::new(64 * 1024, 3, 1)
    }
}

/// Random salt fed to the KDF. Not secret, but must be persisted.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Salt([u8; SALT_SIZE]);

impl Salt {
    /// Generate a fresh random salt.
    pub fn random() -> Result<Self, CryptoError> {
        let mut bytes = [0u8; SALT_SIZE];
        getrandom::getrandom(&mut bytes)
            .map_err(|e| CryptoError::KeyDerivationFailed(e.to_string()))?;
        Ok(Self(bytes))
    }

    /// Wrap existing salt bytes.
    pub fn from_bytes(bytes: [u8; SALT_SIZE]) -> Self {
        Self(bytes)
    }

    /// Parse a hex-encoded salt.
    pub fn from_hex(text: &str) -> Result<Self, CryptoError> {
        let bytes = hex::decode(text.trim()).map_err(|e| CryptoError::InvalidSalt(e.to_string()))?;
        let bytes: [u8; SALT_SIZE] = bytes.try_into().map_err(|v: Vec<u8>| {
            CryptoError::InvalidSalt(format!("expected {SALT_SIZE} bytes, got {}", v.len()))
        })?;
        Ok(Self(bytes))
    }

    /// Hex encoding for config files.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Raw bytes.
    pub fn as_bytes(&self) -> &[u8; SALT_SIZE] {
        &self.0
    }
}

impl fmt::Debug for Salt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Salt({})", self.to_hex())
    }
}

/// A derived 256-bit key. Zeroed on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey([u8; KEY_SIZE]);

impl SymmetricKey {
    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

// Don't leak keys in debug output
impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SymmetricKey([REDACTED])")
    }
}

/// Derive a key from a passphrase with Argon2id.
///
/// Generates a random salt when none is given and returns the salt used.
/// Passphrases shorter than [`MIN_PASSPHRASE_CHARS`] are rejected before
/// any derivation work happens.
pub fn derive_key(
    passphrase: &str,
    salt: Option<Salt>,
    params: KdfParams,
) -> Result<(SymmetricKey, Salt), CryptoError> {
    check_passphrase(passphrase)?;
    let salt = match salt {
        Some(salt) => salt,
        None => Salt::random()?,
    };

    let argon2 = Argon2::new(
        argon2::Algorithm::Argon2id,
        Version::V0x13,
        params.to_argon2_params()?,
    );
    let mut output = [0u8; KEY_SIZE];
    argon2
        .hash_password_into(passphrase.as_bytes(), salt.as_bytes(), &mut output)
        .map_err(|e| CryptoError::KeyDerivationFailed(e.to_string()))?;

    let key = SymmetricKey(output);
    output.zeroize();
    Ok((key, salt))
}

fn check_passphrase(passphrase: &str) -> Result<(), CryptoError> {
    if passphrase.chars().count() < MIN_PASSPHRASE_CHARS {
        return Err(CryptoError::WeakPassphrase {
            min: MIN_PASSPHRASE_CHARS,
        });
    }
    Ok(())
}

/// One entry of a persisted key history, used by [`EncryptionService::restore`].
#[derive(Clone, Copy)]
pub struct KeySpec<'a> {
    /// Key version.
    pub version: u32,
    /// Passphrase that produced this version.
    pub passphrase: &'a str,
    /// Salt recorded for this version.
    pub salt: Salt,
}

impl fmt::Debug for KeySpec<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeySpec")
            .field("version", &self.version)
            .field("passphrase", &"[REDACTED]")
            .field("salt", &self.salt)
            .finish()
    }
}

/// Active key plus retired keys, keyed by version.
struct KeyRing {
    active: u32,
    keys: BTreeMap<u32, SymmetricKey>,
    salts: BTreeMap<u32, Salt>,
}

impl KeyRing {
    fn active_key(&self) -> Result<&SymmetricKey, CryptoError> {
        self.keys
            .get(&self.active)
            .ok_or(CryptoError::UnknownKeyVersion(self.active))
    }
}

/// Authenticated encryption with a versioned key history.
///
/// Safe to share across tasks: encrypt/decrypt take a read lock, only
/// rotation and destruction take the write lock.
pub struct EncryptionService {
    params: KdfParams,
    ring: RwLock<Option<KeyRing>>,
}

impl EncryptionService {
    /// Derive key version 1 from a passphrase.
    ///
    /// Pass the stored salt to re-derive an existing key; `None` creates a
    /// new one (read it back with [`salt_for`](Self::salt_for) and persist it).
    pub fn new(passphrase: &str, salt: Option<Salt>, params: KdfParams) -> Result<Self, CryptoError> {
        let (key, salt) = derive_key(passphrase, salt, params)?;
        let ring = KeyRing {
            active: 1,
            keys: BTreeMap::from([(1, key)]),
            salts: BTreeMap::from([(1, salt)]),
        };
        Ok(Self {
            params,
            ring: RwLock::new(Some(ring)),
        })
    }

    /// Rebuild a service from a persisted key history.
    ///
    /// The highest version becomes the active key.
    pub fn restore(specs: &[KeySpec<'_>], params: KdfParams) -> Result<Self, CryptoError> {
        let mut keys = BTreeMap::new();
        let mut salts = BTreeMap::new();
        for spec in specs {
            let (key, salt) = derive_key(spec.passphrase, Some(spec.salt), params)?;
            keys.insert(spec.version, key);
            salts.insert(spec.version, salt);
        }
        let active = *keys.keys().next_back().ok_or(CryptoError::EmptyKeyHistory)?;
        tracing::debug!("restored {} key versions, active {}", keys.len(), active);

        Ok(Self {
            params,
            ring: RwLock::new(Some(KeyRing {
                active,
                keys,
                salts,
            })),
        })
    }

    /// Encrypt with the active key.
    ///
    /// Every call draws a fresh IV, so identical plaintexts produce
    /// different envelopes.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<EncryptedEnvelope, CryptoError> {
        let guard = self.ring.read().unwrap_or_else(PoisonError::into_inner);
        let ring = guard.as_ref().ok_or(CryptoError::ServiceDestroyed)?;
        let key = ring.active_key()?;

        let mut iv = [0u8; IV_SIZE];
        getrandom::getrandom(&mut iv).map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

        let algorithm = Algorithm::Aes256Gcm;
        let metadata = EnvelopeMetadata {
            original_size: plaintext.len() as u64,
            timestamp: now_millis(),
            checksum: Some(checksum(plaintext)),
        };
        let aad = associated_data(algorithm, ring.active, &metadata);

        let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
            .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;
        let mut sealed = cipher
            .encrypt(
                Nonce::from_slice(&iv),
                Payload {
                    msg: plaintext,
                    aad: &aad,
                },
            )
            .map_err(|_| CryptoError::EncryptionFailed("aead encrypt failed".into()))?;

        // aes-gcm appends the tag; the envelope carries it separately
        let auth_tag = sealed.split_off(sealed.len() - TAG_SIZE);

        Ok(EncryptedEnvelope {
            encrypted_payload: sealed,
            iv: iv.to_vec(),
            auth_tag,
            algorithm,
            key_version: ring.active,
            metadata,
        })
    }

    /// Decrypt with the key matching the envelope's version.
    pub fn decrypt(&self, envelope: &EncryptedEnvelope) -> Result<Vec<u8>, CryptoError> {
        let guard = self.ring.read().unwrap_or_else(PoisonError::into_inner);
        let ring = guard.as_ref().ok_or(CryptoError::ServiceDestroyed)?;

        envelope
            .check_shape()
            .map_err(|e| CryptoError::MalformedEnvelope(e.to_string()))?;
        let key = ring
            .keys
            .get(&envelope.key_version)
            .ok_or(CryptoError::UnknownKeyVersion(envelope.key_version))?;

        let aad = associated_data(envelope.algorithm, envelope.key_version, &envelope.metadata);
        let mut sealed = Vec::with_capacity(envelope.encrypted_payload.len() + TAG_SIZE);
        sealed.extend_from_slice(&envelope.encrypted_payload);
        sealed.extend_from_slice(&envelope.auth_tag);

        let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
            .map_err(|_| CryptoError::DecryptionFailed)?;
        let plaintext = cipher
            .decrypt(
                Nonce::from_slice(&envelope.iv),
                Payload {
                    msg: &sealed,
                    aad: &aad,
                },
            )
            .map_err(|_| CryptoError::DecryptionFailed)?;

        if let Some(expected) = &envelope.metadata.checksum {
            if !checksum(&plaintext).eq_ignore_ascii_case(expected) {
                return Err(CryptoError::ChecksumMismatch);
            }
        }
        Ok(plaintext)
    }

    /// Serialize a value to JSON and encrypt it.
    pub fn encrypt_json<T: Serialize>(&self, value: &T) -> Result<EncryptedEnvelope, CryptoError> {
        let bytes = serde_json::to_vec(value)?;
        self.encrypt(&bytes)
    }

    /// Decrypt an envelope and parse the plaintext as JSON.
    pub fn decrypt_json<T: DeserializeOwned>(
        &self,
        envelope: &EncryptedEnvelope,
    ) -> Result<T, CryptoError> {
        let bytes = self.decrypt(envelope)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Derive a new key, make it active and retire the previous one.
    ///
    /// Returns the new key version. Old keys stay available for decryption.
    pub fn rotate_key(&self, new_passphrase: &str) -> Result<u32, CryptoError> {
        if self.is_destroyed() {
            return Err(CryptoError::ServiceDestroyed);
        }
        // Derive outside the lock; Argon2 is slow on purpose
        let (key, salt) = derive_key(new_passphrase, None, self.params)?;

        let mut guard = self.ring.write().unwrap_or_else(PoisonError::into_inner);
        let ring = guard.as_mut().ok_or(CryptoError::ServiceDestroyed)?;
        let retired = ring.active;
        let version = retired.saturating_add(1);
        ring.keys.insert(version, key);
        ring.salts.insert(version, salt);
        ring.active = version;

        tracing::info!("rotated encryption key: v{} retired, v{} active", retired, version);
        Ok(version)
    }

    /// Zero all key bytes and make the service permanently unusable.
    ///
    /// Idempotent.
    pub fn destroy(&self) {
        let mut guard = self.ring.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(mut ring) = guard.take() {
            for key in ring.keys.values_mut() {
                key.zeroize();
            }
            tracing::info!("encryption service destroyed ({} keys zeroed)", ring.keys.len());
        }
    }

    /// Check if [`destroy`](Self::destroy) has been called.
    pub fn is_destroyed(&self) -> bool {
        self.ring
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    /// Version new envelopes are encrypted with.
    pub fn active_version(&self) -> Result<u32, CryptoError> {
        let guard = self.ring.read().unwrap_or_else(PoisonError::into_inner);
        guard
            .as_ref()
            .map(|ring| ring.active)
            .ok_or(CryptoError::ServiceDestroyed)
    }

    /// All held key versions, ascending.
    pub fn key_versions(&self) -> Result<Vec<u32>, CryptoError> {
        let guard = self.ring.read().unwrap_or_else(PoisonError::into_inner);
        guard
            .as_ref()
            .map(|ring| ring.keys.keys().copied().collect())
            .ok_or(CryptoError::ServiceDestroyed)
    }

    /// Salt used to derive a key version.
    pub fn salt_for(&self, version: u32) -> Result<Option<Salt>, CryptoError> {
        let guard = self.ring.read().unwrap_or_else(PoisonError::into_inner);
        guard
            .as_ref()
            .map(|ring| ring.salts.get(&version).copied())
            .ok_or(CryptoError::ServiceDestroyed)
    }

    /// Key check value for a version.
    ///
    /// A hash of the derived key under a fixed label. Safe to persist next to
    /// the salt; it lets a later session detect a mistyped passphrase before
    /// anything is encrypted with the wrong key.
    pub fn key_check(&self, version: u32) -> Result<String, CryptoError> {
        let guard = self.ring.read().unwrap_or_else(PoisonError::into_inner);
        let ring = guard.as_ref().ok_or(CryptoError::ServiceDestroyed)?;
        let key = ring
            .keys
            .get(&version)
            .ok_or(CryptoError::UnknownKeyVersion(version))?;
        Ok(key_check_value(version, key))
    }

    /// Compare a held key against a persisted key check value.
    pub fn verify_key_check(&self, version: u32, expected: &str) -> Result<(), CryptoError> {
        if self.key_check(version)?.eq_ignore_ascii_case(expected.trim()) {
            Ok(())
        } else {
            tracing::warn!("key check mismatch for key version {}", version);
            Err(CryptoError::WrongPassphrase(version))
        }
    }

    /// KDF parameters used for every version.
    pub fn params(&self) -> KdfParams {
        self.params
    }
}

impl fmt::Debug for EncryptionService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptionService")
            .field("params", &self.params)
            .field("active_version", &self.active_version().ok())
            .field("keys", &"[REDACTED]")
            .finish()
    }
}

/// Hex SHA-256 of the plaintext.
fn checksum(plaintext: &[u8]) -> String {
    hex::encode(Sha256::digest(plaintext))
}

fn key_check_value(version: u32, key: &SymmetricKey) -> String {
    let digest = Sha256::new()
        .chain_update(b"locksync/key-check/1|")
        .chain_update(version.to_be_bytes())
        .chain_update(key.as_bytes())
        .finalize();
    hex::encode(digest)
}

fn associated_data(algorithm: Algorithm, key_version: u32, metadata: &EnvelopeMetadata) -> Vec<u8> {
    format!(
        "locksync/1|{}|{}|{}|{}|{}",
        algorithm.as_str(),
        key_version,
        metadata.original_size,
        metadata.timestamp,
        metadata.checksum.as_deref().unwrap_or("")
    )
    .into_bytes()
}
