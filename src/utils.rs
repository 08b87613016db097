// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Utility functions for mindguard.
//!
//! This module provides common utility functions used across the codebase.

use chrono::Utc;
use rand::Rng;

/// Mask an email address for logging.
///
/// Keeps the first character of the local part and the full domain so log
/// lines stay useful without recording who the student is.
///
/// # Examples
///
/// ```
/// use mindguard::utils::mask_email;
///
/// assert_eq!(mask_email("juan.delacruz@lspu.edu.ph"), "j***@lspu.edu.ph");
/// assert_eq!(mask_email("not-an-email"), "n***");
/// ```
pub fn mask_email(email: &str) -> String {
    let email = email.trim();
    let (local, domain) = match email.split_once('@') {
        Some((local, domain)) => (local, Some(domain)),
        None => (email, None),
    };

    let first: String = local.chars().take(1).collect();
    match domain {
        Some(domain) => format!("{}***@{}", first, domain),
        None => format!("{}***", first),
    }
}

/// Generate a record id: current time in milliseconds followed by a random suffix.
///
/// Ids sort roughly by creation time and stay unique when two records are
/// created within the same millisecond.
pub fn generate_id() -> String {
    let millis = Utc::now().timestamp_millis();
    let suffix: u32 = rand::thread_rng().gen();
    format!("{}{:08x}", millis, suffix)
}
