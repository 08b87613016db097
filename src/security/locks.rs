// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Poison-tolerant lock helpers.
//!
//! The conversation transcript and the in-memory store sit behind `RwLock`s
//! that reply tasks touch from the runtime. A panic in one task must not take
//! the whole chat down with it, so these helpers log the poisoning and hand
//! back the guard anyway.
//!
//! ```no_run
//! use std::sync::RwLock;
//! use mindguard::security::locks::{resilient_read, resilient_write};
//!
//! let lock = RwLock::new(Vec::<String>::new());
//! resilient_write(&lock).push("hello".to_string());
//! assert_eq!(resilient_read(&lock).len(), 1);
//! ```

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Acquire a read lock, recovering from poisoning if necessary.
#[inline]
pub fn resilient_read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    match lock.read() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::error!(
                target: "security::locks",
                event = "LOCK_POISONED_READ",
                "RwLock was poisoned during read acquisition. Recovering data."
            );
            poisoned.into_inner()
        }
    }
}

/// Acquire a write lock, recovering from poisoning if necessary.
#[inline]
pub fn resilient_write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    match lock.write() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::error!(
                target: "security::locks",
                event = "LOCK_POISONED_WRITE",
                "RwLock was poisoned during write acquisition. Recovering data."
            );
            poisoned.into_inner()
        }
    }
}
