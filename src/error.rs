// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Error types and consistent error formatting for mindguard.
//!
//! Library operations return the typed errors below. The CLI turns them into
//! messages with possible causes, suggested fixes, and the crisis footer so a
//! student who hits a wall is never left without a pointer to real help.

use std::fmt;
use thiserror::Error;

/// Footer appended to every formatted error.
pub const SUPPORT_FOOTER: &str =
    "If you are in immediate danger, please call local emergency services (911).";

/// Errors from the key/value stores.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage I/O failed for '{key}': {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Timed out waiting for the storage lock: {0}")]
    LockTimeout(String),

    #[error("Stored value for '{key}' could not be parsed: {source}")]
    Parse {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Value for '{key}' could not be serialized: {source}")]
    Serialize {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors from password hashing, key derivation and sealing.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Password hashing failed: {0}")]
    Hash(String),

    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("Key import failed: {0}")]
    KeyImport(String),

    #[error("Encryption failed")]
    Encrypt,

    #[error("Decryption failed: wrong key or corrupted data")]
    Decrypt,
}

/// Errors from login, signup and profile operations.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("User not found")]
    NotFound,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Email already exists")]
    DuplicateEmail,

    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("You need to be signed in to an account for this")]
    NotSignedIn,

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

impl AuthError {
    /// Build a formatted message with causes and fixes for this error.
    pub fn explain(&self) -> String {
        let builder = ErrorBuilder::new(self.to_string());
        match self {
            AuthError::NotFound => builder
                .cause("No account uses this email on this device")
                .fix("Check the email for typos")
                .fix("Create an account: mindguard signup")
                .fix("Or continue without one: mindguard guest")
                .build(),
            AuthError::InvalidCredentials => builder
                .cause("The password does not match this account")
                .fix("Check Caps Lock and try again: mindguard login")
                .build(),
            AuthError::DuplicateEmail => builder
                .cause("An account with this email already exists on this device")
                .fix("Log in instead: mindguard login")
                .build(),
            AuthError::MissingField(_) => builder
                .fix("Fill in every required field and try again")
                .build(),
            AuthError::NotSignedIn => builder
                .cause("No account is signed in, or you are using guest mode")
                .fix("Log in: mindguard login")
                .build(),
            AuthError::Storage(_) => builder
                .cause("The data directory is not writable or a stored file is damaged")
                .fix("Check the data directory: mindguard config show")
                .build(),
            AuthError::Crypto(_) => builder.build(),
        }
    }
}

/// Errors from the emergency contact list.
#[derive(Debug, Error)]
pub enum ContactError {
    #[error("Contact {0} is required")]
    MissingField(&'static str),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Formats an error message with title, causes, fixes, and the support footer.
///
/// # Example
///
/// ```
/// use mindguard::error::format_error;
///
/// let error = format_error(
///     "Invalid credentials",
///     &["The password does not match this account"],
///     &["Try again: mindguard login"],
/// );
/// assert!(error.contains("Possible causes:"));
/// ```
pub fn format_error(title: &str, causes: &[&str], fixes: &[&str]) -> String {
    let mut output = String::new();

    output.push_str(&format!("[✗] {}\n\n", title));

    if !causes.is_empty() {
        output.push_str("Possible causes:\n");
        for cause in causes {
            output.push_str(&format!("  - {}\n", cause));
        }
        output.push('\n');
    }

    if !fixes.is_empty() {
        output.push_str("Try these fixes:\n");
        for (i, fix) in fixes.iter().enumerate() {
            output.push_str(&format!("  {}. {}\n", i + 1, fix));
        }
        output.push('\n');
    }

    output.push_str(SUPPORT_FOOTER);

    output
}

/// Formats a simple error with just a title and the support footer.
pub fn format_simple_error(title: &str) -> String {
    format!("[✗] {}\n\n{}", title, SUPPORT_FOOTER)
}

/// Builder for constructing formatted error messages.
///
/// # Example
///
/// ```
/// use mindguard::error::ErrorBuilder;
///
/// let error = ErrorBuilder::new("Could not save contact")
///     .cause("The data directory is read-only")
///     .fix("Check permissions on ~/.mindguard")
///     .build();
/// println!("{}", error);
/// ```
#[derive(Debug, Clone)]
pub struct ErrorBuilder {
    title: String,
    causes: Vec<String>,
    fixes: Vec<String>,
}

impl ErrorBuilder {
    /// Create a new error builder with the given title.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            causes: Vec::new(),
            fixes: Vec::new(),
        }
    }

    /// Add a possible cause.
    pub fn cause(mut self, cause: impl Into<String>) -> Self {
        self.causes.push(cause.into());
        self
    }

    /// Add a suggested fix.
    pub fn fix(mut self, fix: impl Into<String>) -> Self {
        self.fixes.push(fix.into());
        self
    }

    /// Build the formatted error message.
    pub fn build(self) -> String {
        let causes: Vec<&str> = self.causes.iter().map(|s| s.as_str()).collect();
        let fixes: Vec<&str> = self.fixes.iter().map(|s| s.as_str()).collect();
        format_error(&self.title, &causes, &fixes)
    }
}

impl fmt::Display for ErrorBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.clone().build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_error() {
        let error = format_error(
            "Test Error",
            &["Cause 1", "Cause 2"],
            &["Fix 1", "Fix 2"],
        );

        assert!(error.contains("[✗] Test Error"));
        assert!(error.contains("  - Cause 1"));
        assert!(error.contains("  - Cause 2"));
        assert!(error.contains("  1. Fix 1"));
        assert!(error.contains("  2. Fix 2"));
        assert!(error.ends_with(SUPPORT_FOOTER));
    }

    #[test]
    fn test_empty_causes_and_fixes() {
        let error = format_error("Empty test", &[], &[]);
        assert!(error.contains("[✗] Empty test"));
        assert!(!error.contains("Possible causes:"));
        assert!(!error.contains("Try these fixes:"));
        assert_eq!(error, format_simple_error("Empty test"));
    }

    #[test]
    fn test_error_builder_display() {
        let builder = ErrorBuilder::new("Display test").cause("Cause").fix("Fix");
        let error = format!("{}", builder);
        assert!(error.contains("[✗] Display test"));
        assert!(error.contains("Cause"));
    }

    #[test]
    fn test_auth_error_messages() {
        assert_eq!(AuthError::NotFound.to_string(), "User not found");
        assert_eq!(AuthError::InvalidCredentials.to_string(), "Invalid credentials");
        assert_eq!(AuthError::DuplicateEmail.to_string(), "Email already exists");
        assert_eq!(AuthError::MissingField("Email").to_string(), "Email is required");

        let explained = AuthError::NotFound.explain();
        assert!(explained.contains("mindguard signup"));
    }
}
