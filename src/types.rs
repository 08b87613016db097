// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Canonical types used across mindguard.
//!
//! Stored records use camelCase field names so existing data keeps loading.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::utils::generate_id;

/// Display name of the placeholder user for guest sessions.
pub const ANONYMOUS_NAME: &str = "Anonymous";

/// Email slot of the placeholder user. Never matched against stored accounts.
pub const ANONYMOUS_EMAIL: &str = "anonymous";

/// A registered student account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub email: String,
    pub fullname: String,
    #[serde(default)]
    pub studentid: String,
    #[serde(default)]
    pub program: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    /// Hex salt for key derivation. Empty on records created before it existed.
    #[serde(default)]
    pub key_salt: String,
}

impl User {
    /// Placeholder user for guest sessions. Not persisted.
    pub fn anonymous() -> Self {
        Self {
            email: ANONYMOUS_EMAIL.to_string(),
            fullname: ANONYMOUS_NAME.to_string(),
            studentid: String::new(),
            program: String::new(),
            password_hash: String::new(),
            created_at: Utc::now(),
            key_salt: String::new(),
        }
    }

    /// Case-insensitive email comparison.
    pub fn has_email(&self, email: &str) -> bool {
        self.email.trim().eq_ignore_ascii_case(email.trim())
    }
}

/// Fields collected by the signup form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUser {
    pub email: String,
    pub fullname: String,
    pub studentid: String,
    pub program: String,
}

/// Editable profile fields. `None` leaves the field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub fullname: Option<String>,
    pub studentid: Option<String>,
    pub program: Option<String>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.fullname.is_none() && self.studentid.is_none() && self.program.is_none()
    }
}

/// The one active identity record, authenticated or guest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub email: Option<String>,
    pub anon: bool,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn for_user(email: &str) -> Self {
        Self {
            email: Some(email.to_string()),
            anon: false,
            created_at: Utc::now(),
        }
    }

    pub fn anonymous() -> Self {
        Self {
            email: None,
            anon: true,
            created_at: Utc::now(),
        }
    }
}

/// Who wrote a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Ai,
}

impl std::fmt::Display for Sender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Sender::User => write!(f, "user"),
            Sender::Ai => write!(f, "ai"),
        }
    }
}

/// A chat message. Held in memory only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub text: String,
    pub sender: Sender,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(text: impl Into<String>, sender: Sender) -> Self {
        Self {
            id: generate_id(),
            text: text.into(),
            sender,
            timestamp: Utc::now(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(text, Sender::User)
    }

    pub fn ai(text: impl Into<String>) -> Self {
        Self::new(text, Sender::Ai)
    }
}

/// A trusted person to reach in an emergency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmergencyContact {
    pub id: String,
    pub name: String,
    pub phone: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_storage_format() {
        let json = r#"{
            "email": "ana@lspu.edu.ph",
            "fullname": "Ana Reyes",
            "studentid": "0321-1234",
            "program": "BSIT",
            "passwordHash": "abc",
            "createdAt": "2025-01-15T10:23:45Z"
        }"#;
        let user: User = serde_json::from_str(json).unwrap();
        assert_eq!(user.password_hash, "abc");
        assert!(user.key_salt.is_empty());

        let value = serde_json::to_value(&user).unwrap();
        assert!(value.get("passwordHash").is_some());
        assert!(value.get("createdAt").is_some());
    }

    #[test]
    fn test_anonymous_session_format() {
        let value = serde_json::to_value(Session::anonymous()).unwrap();
        assert!(value["email"].is_null());
        assert_eq!(value["anon"], true);
    }

    #[test]
    fn test_has_email_ignores_case() {
        let mut user = User::anonymous();
        user.email = "Ana@LSPU.edu.ph".to_string();
        assert!(user.has_email("ana@lspu.edu.ph"));
        assert!(!user.has_email("ana@lspu.edu"));
    }

    #[test]
    fn test_sender_serializes_lowercase() {
        let msg = Message::ai("hi");
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["sender"], "ai");
    }
}
