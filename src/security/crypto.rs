// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Password hashing, key derivation and sealing.
//!
//! - Password hashes are Argon2id PHC strings with a random per-hash salt.
//! - The session key is 32 raw Argon2id output bytes over the password and
//!   the user's key salt. It is never persisted; only its exported form is
//!   cached in session storage.
//! - Sealing uses ChaCha20-Poly1305 with a random 12-byte nonce.

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::error::CryptoError;

pub const KEY_SIZE: usize = 32;
pub const NONCE_SIZE: usize = 12;
pub const SALT_SIZE: usize = 16;

/// `kty` of an exported key record.
pub const EXPORTED_KEY_TYPE: &str = "oct";

/// `alg` of an exported key record.
pub const EXPORTED_KEY_ALG: &str = "C20P";

// Argon2id, 19 MiB, 2 passes, 1 lane.
const ARGON2_MEMORY_KIB: u32 = 19 * 1024;
const ARGON2_ITERATIONS: u32 = 2;
const ARGON2_LANES: u32 = 1;

fn argon2() -> Result<Argon2<'static>, CryptoError> {
    let params = Params::new(
        ARGON2_MEMORY_KIB,
        ARGON2_ITERATIONS,
        ARGON2_LANES,
        Some(KEY_SIZE),
    )
    .map_err(|e| CryptoError::Hash(e.to_string()))?;
    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

/// Generate a random salt.
pub fn generate_salt() -> [u8; SALT_SIZE] {
    let mut salt = [0u8; SALT_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut salt);
    salt
}

/// Hash a password with a fresh random salt.
pub fn hash_password(password: &str) -> Result<String, CryptoError> {
    hash_password_with_salt(password, &generate_salt())
}

/// Hash a password with the given salt. Deterministic for a fixed salt.
pub fn hash_password_with_salt(password: &str, salt: &[u8]) -> Result<String, CryptoError> {
    let salt = SaltString::encode_b64(salt).map_err(|e| CryptoError::Hash(e.to_string()))?;
    let hash = argon2()?
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| CryptoError::Hash(e.to_string()))?;
    Ok(hash.to_string())
}

/// Check a password against a stored PHC hash.
///
/// A malformed stored hash never verifies.
pub fn verify_password(password: &str, stored_hash: &str) -> Result<bool, CryptoError> {
    let parsed = match PasswordHash::new(stored_hash) {
        Ok(parsed) => parsed,
        Err(e) => {
            tracing::warn!("PASSWORD_HASH_MALFORMED | error={}", e);
            return Ok(false);
        }
    };

    Ok(argon2()?
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

/// Derive the session encryption key from a password and salt.
///
/// The salt must be at least 8 bytes.
pub fn derive_key(password: &str, salt: &[u8]) -> Result<EncryptionKey, CryptoError> {
    let mut bytes = [0u8; KEY_SIZE];
    argon2()?
        .hash_password_into(password.as_bytes(), salt, &mut bytes)
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
    Ok(EncryptionKey(bytes))
}

/// Symmetric key derived from the user's password.
#[derive(Clone, PartialEq, Eq)]
pub struct EncryptionKey([u8; KEY_SIZE]);

impl EncryptionKey {
    /// Export to the record cached in session storage.
    pub fn export(&self) -> ExportedKey {
        ExportedKey {
            kty: EXPORTED_KEY_TYPE.to_string(),
            alg: EXPORTED_KEY_ALG.to_string(),
            k: hex::encode(self.0),
            ext: true,
        }
    }

    /// Rebuild a key from its exported record.
    pub fn import(exported: &ExportedKey) -> Result<Self, CryptoError> {
        if exported.kty != EXPORTED_KEY_TYPE {
            return Err(CryptoError::KeyImport(format!("unsupported key type '{}'", exported.kty)));
        }
        if exported.alg != EXPORTED_KEY_ALG {
            return Err(CryptoError::KeyImport(format!("unsupported algorithm '{}'", exported.alg)));
        }

        let bytes = hex::decode(&exported.k)
            .map_err(|e| CryptoError::KeyImport(format!("key material is not hex: {}", e)))?;
        let bytes: [u8; KEY_SIZE] = bytes
            .try_into()
            .map_err(|_| CryptoError::KeyImport("key must be 32 bytes".to_string()))?;
        Ok(Self(bytes))
    }

    /// Encrypt `plaintext`, binding `aad` into the tag.
    pub fn seal(&self, plaintext: &[u8], aad: &[u8]) -> Result<SealedBlob, CryptoError> {
        let mut nonce = [0u8; NONCE_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut nonce);

        let aead = ChaCha20Poly1305::new(Key::from_slice(&self.0));
        let ciphertext = aead
            .encrypt(Nonce::from_slice(&nonce), Payload { msg: plaintext, aad })
            .map_err(|_| CryptoError::Encrypt)?;

        Ok(SealedBlob {
            alg: EXPORTED_KEY_ALG.to_string(),
            nonce: hex::encode(nonce),
            ciphertext: hex::encode(ciphertext),
        })
    }

    /// Decrypt a blob produced by [`EncryptionKey::seal`] with the same `aad`.
    pub fn open(&self, blob: &SealedBlob, aad: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let nonce = hex::decode(&blob.nonce).map_err(|_| CryptoError::Decrypt)?;
        if nonce.len() != NONCE_SIZE {
            return Err(CryptoError::Decrypt);
        }
        let ciphertext = hex::decode(&blob.ciphertext).map_err(|_| CryptoError::Decrypt)?;

        let aead = ChaCha20Poly1305::new(Key::from_slice(&self.0));
        aead.decrypt(Nonce::from_slice(&nonce), Payload { msg: &ciphertext, aad })
            .map_err(|_| CryptoError::Decrypt)
    }
}

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("EncryptionKey(..)")
    }
}

/// Serialized key record, shaped like a JWK `oct` key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportedKey {
    pub kty: String,
    pub alg: String,
    pub k: String,
    #[serde(default)]
    pub ext: bool,
}

/// Output of [`EncryptionKey::seal`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedBlob {
    pub alg: String,
    pub nonce: String,
    pub ciphertext: String,
}
