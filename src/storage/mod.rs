// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Key/value storage for mindguard.
//!
//! Two scopes are used:
//!
//! - **local**: persistent, one directory per data profile (`~/.mindguard/storage`).
//!   Holds the user list, the active session and the emergency contacts.
//! - **session**: lives in the OS runtime directory and disappears with the
//!   login session. Holds only the exported key cache.
//!
//! Every value is a JSON document written wholesale; there is no partial
//! update path.

pub mod file;
pub mod memory;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::StorageError;

pub use file::FileStorage;
pub use memory::MemoryStorage;

/// Storage keys. Opaque names used for namespacing.
pub mod keys {
    /// Ordered list of registered users (local scope).
    pub const USERS: &str = "mindguard_users";
    /// Active session record (local scope).
    pub const SESSION: &str = "mindguard_session";
    /// Ordered list of emergency contacts (local scope).
    pub const CONTACTS: &str = "trusted_contacts";
    /// Exported session key (session scope).
    pub const KEY_CACHE: &str = "mindguard_key_temp";
}

/// A string key/value store.
pub trait Storage: Send + Sync {
    /// Read the raw value stored under `key`.
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Replace the value stored under `key`.
    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete `key`. Deleting a missing key is not an error.
    fn remove_item(&self, key: &str) -> Result<(), StorageError>;
}

/// Read and parse a JSON value. `Ok(None)` when the key is absent.
pub fn read_json<T: DeserializeOwned>(
    storage: &dyn Storage,
    key: &str,
) -> Result<Option<T>, StorageError> {
    match storage.get_item(key)? {
        Some(raw) => serde_json::from_str(&raw)
            .map(Some)
            .map_err(|source| StorageError::Parse {
                key: key.to_string(),
                source,
            }),
        None => Ok(None),
    }
}

/// Read a JSON value, falling back to `default` when it is absent or unreadable.
///
/// Failures are logged and swallowed.
pub fn read_json_or<T: DeserializeOwned>(storage: &dyn Storage, key: &str, default: T) -> T {
    match read_json(storage, key) {
        Ok(Some(value)) => value,
        Ok(None) => default,
        Err(e) => {
            tracing::warn!("STORAGE_READ_FAILED | key={} error={}", key, e);
            default
        }
    }
}

/// Serialize `value` as JSON and store it under `key`.
pub fn write_json<T: Serialize + ?Sized>(
    storage: &dyn Storage,
    key: &str,
    value: &T,
) -> Result<(), StorageError> {
    let raw = serde_json::to_string(value).map_err(|source| StorageError::Serialize {
        key: key.to_string(),
        source,
    })?;
    storage.set_item(key, &raw)
}
