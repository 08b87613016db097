// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Security primitives for mindguard.
//!
//! - [`crypto`]: Argon2id password hashes, key derivation, ChaCha20-Poly1305 sealing
//! - [`locks`]: poison-tolerant `RwLock` helpers
//!
//! ## Usage
//!
//! ```no_run
//! use mindguard::security::{derive_key, hash_password, verify_password};
//!
//! let hash = hash_password("correct horse")?;
//! assert!(verify_password("correct horse", &hash)?);
//!
//! let key = derive_key("correct horse", b"per-user-salt")?;
//! let sealed = key.seal(b"notes", b"export")?;
//! # Ok::<(), mindguard::error::CryptoError>(())
//! ```

pub mod crypto;
pub mod locks;

pub use crypto::{
    derive_key, generate_salt, hash_password, hash_password_with_salt, verify_password,
    EncryptionKey, ExportedKey, SealedBlob, KEY_SIZE,
};
pub use locks::{resilient_read, resilient_write};
