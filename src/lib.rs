// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! mindguard - A private mental-health companion for students
//!
//! Everything stays on this device: accounts, the active session, and the
//! emergency contact list are JSON values in a local store. The companion is
//! a small rule-based classifier, not a model, and it never forgets to point
//! at real help when a message sounds like a crisis.
//!
//! # Core Modules
//!
//! - [`auth`] - Local accounts, session bootstrap, key derivation
//! - [`companion`] - Response classifier and the chat conversation
//! - [`contacts`] - Emergency contacts
//! - [`wellness`] - 4-7-8 breathing exercise
//! - [`storage`] - Key/value stores (file-backed and in-memory)
//! - [`security`] - Password hashing, sealing, lock helpers
//! - [`config`] - `~/.mindguard/config.json`
//! - [`error`] - Error types and consistent error formatting
//! - [`cli`] - Interactive line editing and slash commands

pub mod auth;
pub mod cli;
pub mod companion;
pub mod config;
pub mod contacts;
pub mod error;
pub mod security;
pub mod storage;
pub mod types;
pub mod utils;
pub mod wellness;

pub use auth::{AccountExport, AuthContext, PublicProfile};
pub use companion::{Classifier, Conversation, Reply, ReplyCategory, ReplyDelays};
pub use config::Config;
pub use contacts::EmergencyContacts;
pub use error::{AuthError, ContactError, CryptoError, StorageError};
pub use storage::{FileStorage, MemoryStorage, Storage};
pub use types::{EmergencyContact, Message, NewUser, ProfileUpdate, Sender, Session, User};
