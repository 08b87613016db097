// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Local authentication and session bootstrap.
//!
//! Accounts live in local storage as an ordered user list; the active
//! identity is a single session record next to it. Nothing is validated
//! against a server: bootstrap trusts whatever the stores contain and
//! reconciles it as best it can.
//!
//! ## Key handling
//!
//! A non-anonymous login derives an [`EncryptionKey`] from the password. The
//! key is kept in memory and its exported form is cached in session storage
//! so a restart within the same OS session can restore it without asking for
//! the password again. The cached record names its owner and key salt; it is
//! only restored for that same account. Guests never hold a key.
//!
//! ## Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use mindguard::auth::AuthContext;
//! use mindguard::storage::MemoryStorage;
//!
//! let mut auth = AuthContext::bootstrap(
//!     Arc::new(MemoryStorage::new()),
//!     Arc::new(MemoryStorage::new()),
//! );
//! auth.login("ana@lspu.edu.ph", "password")?;
//! assert!(auth.is_authenticated());
//! # Ok::<(), mindguard::error::AuthError>(())
//! ```

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AuthError;
use crate::security::crypto::{self, EncryptionKey, ExportedKey};
use crate::storage::{keys, read_json, read_json_or, write_json, Storage};
use crate::types::{EmergencyContact, NewUser, ProfileUpdate, Session, User};
use crate::utils::mask_email;

/// Prefix of the key salt used for user records that predate `keySalt`.
const LEGACY_SALT_PREFIX: &str = "mindguard:";

/// The application's identity state: who is signed in and their key.
pub struct AuthContext {
    local: Arc<dyn Storage>,
    session_scope: Arc<dyn Storage>,
    user: Option<User>,
    anon: bool,
    encryption_key: Option<EncryptionKey>,
}

impl AuthContext {
    /// Reconstruct the identity state from storage.
    ///
    /// - A session naming an email activates the matching stored user, or
    ///   nobody if the user is gone.
    /// - An anonymous session activates the placeholder user.
    /// - A cached key is restored only for a resolved real user; a malformed
    ///   cache is logged and ignored.
    pub fn bootstrap(local: Arc<dyn Storage>, session_scope: Arc<dyn Storage>) -> Self {
        let mut ctx = Self {
            local,
            session_scope,
            user: None,
            anon: false,
            encryption_key: None,
        };

        let session: Option<Session> = read_json_or(ctx.local.as_ref(), keys::SESSION, None);
        match session {
            Some(Session { email: Some(email), .. }) => {
                match ctx.load_users().into_iter().find(|u| u.has_email(&email)) {
                    Some(user) => {
                        tracing::info!("AUTH_RESTORED | email={}", mask_email(&user.email));
                        ctx.encryption_key = ctx.restore_cached_key(&user);
                        ctx.user = Some(user);
                    }
                    None => {
                        tracing::warn!(
                            "AUTH_RESTORE_ORPHANED | email={} reason=user_missing",
                            mask_email(&email)
                        );
                    }
                }
            }
            Some(Session { anon: true, .. }) => {
                tracing::info!("AUTH_RESTORED | anon=true");
                ctx.user = Some(User::anonymous());
                ctx.anon = true;
            }
            _ => {}
        }

        ctx
    }

    /// The cached key, if it was cached for `user`.
    fn restore_cached_key(&self, user: &User) -> Option<EncryptionKey> {
        let cached: CachedKey = match read_json(self.session_scope.as_ref(), keys::KEY_CACHE) {
            Ok(Some(cached)) => cached,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!("KEY_CACHE_UNREADABLE | error={}", e);
                return None;
            }
        };

        // The session store can be shared by several data dirs.
        if !user.has_email(&cached.owner) || cached.key_salt != user.key_salt {
            tracing::warn!(
                "KEY_CACHE_MISMATCH | email={} owner={}",
                mask_email(&user.email),
                mask_email(&cached.owner)
            );
            return None;
        }

        match EncryptionKey::import(&cached.key) {
            Ok(key) => Some(key),
            Err(e) => {
                tracing::warn!("KEY_CACHE_UNREADABLE | error={}", e);
                None
            }
        }
    }

    /// Currently active user, including the guest placeholder.
    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    /// True when the active session is a guest session.
    pub fn is_anonymous(&self) -> bool {
        self.anon && self.user.is_some()
    }

    /// Key derived at login, if a real account is signed in.
    pub fn encryption_key(&self) -> Option<&EncryptionKey> {
        self.encryption_key.as_ref()
    }

    /// Stored users, in signup order.
    pub fn users(&self) -> Vec<User> {
        self.load_users()
    }

    fn load_users(&self) -> Vec<User> {
        read_json_or(self.local.as_ref(), keys::USERS, Vec::new())
    }

    fn save_users(&self, users: &[User]) -> Result<(), AuthError> {
        write_json(self.local.as_ref(), keys::USERS, users)?;
        Ok(())
    }

    /// Sign in with email and password.
    pub fn login(&mut self, email: &str, password: &str) -> Result<&User, AuthError> {
        let user = self
            .load_users()
            .into_iter()
            .find(|u| u.has_email(email))
            .ok_or_else(|| {
                tracing::info!("AUTH_LOGIN_FAILED | email={} reason=not_found", mask_email(email));
                AuthError::NotFound
            })?;

        if !crypto::verify_password(password, &user.password_hash)? {
            tracing::info!(
                "AUTH_LOGIN_FAILED | email={} reason=invalid_credentials",
                mask_email(email)
            );
            return Err(AuthError::InvalidCredentials);
        }

        self.activate(user, password)?;
        tracing::info!("AUTH_LOGIN | email={}", mask_email(email));
        self.user.as_ref().ok_or(AuthError::NotSignedIn)
    }

    /// Create an account and sign in to it.
    pub fn signup(&mut self, new_user: NewUser, password: &str) -> Result<&User, AuthError> {
        let email = new_user.email.trim().to_string();
        if email.is_empty() {
            return Err(AuthError::MissingField("Email"));
        }
        if new_user.fullname.trim().is_empty() {
            return Err(AuthError::MissingField("Full name"));
        }
        if password.is_empty() {
            return Err(AuthError::MissingField("Password"));
        }

        let mut users = self.load_users();
        if users.iter().any(|u| u.has_email(&email)) {
            tracing::info!("AUTH_SIGNUP_FAILED | email={} reason=duplicate", mask_email(&email));
            return Err(AuthError::DuplicateEmail);
        }

        let user = User {
            email,
            fullname: new_user.fullname.trim().to_string(),
            studentid: new_user.studentid.trim().to_string(),
            program: new_user.program.trim().to_string(),
            password_hash: crypto::hash_password(password)?,
            created_at: Utc::now(),
            key_salt: hex::encode(crypto::generate_salt()),
        };

        users.push(user.clone());
        self.save_users(&users)?;
        tracing::info!(
            "AUTH_SIGNUP | email={} users={}",
            mask_email(&user.email),
            users.len()
        );

        self.activate(user, password)?;
        self.user.as_ref().ok_or(AuthError::NotSignedIn)
    }

    /// Derive and cache the key, then make `user` the active session.
    fn activate(&mut self, user: User, password: &str) -> Result<(), AuthError> {
        let key = crypto::derive_key(password, &key_salt(&user))?;
        let cached = CachedKey {
            owner: user.email.clone(),
            key_salt: user.key_salt.clone(),
            key: key.export(),
        };
        write_json(self.session_scope.as_ref(), keys::KEY_CACHE, &cached)?;
        write_json(self.local.as_ref(), keys::SESSION, &Session::for_user(&user.email))?;

        self.encryption_key = Some(key);
        self.user = Some(user);
        self.anon = false;
        Ok(())
    }

    /// Sign out and forget the session and cached key.
    pub fn logout(&mut self) -> Result<(), AuthError> {
        self.user = None;
        self.anon = false;
        self.encryption_key = None;
        self.local.remove_item(keys::SESSION)?;
        self.session_scope.remove_item(keys::KEY_CACHE)?;
        tracing::info!("AUTH_LOGOUT");
        Ok(())
    }

    /// Continue as a guest.
    pub fn start_anonymous(&mut self) -> Result<&User, AuthError> {
        self.encryption_key = None;
        self.session_scope.remove_item(keys::KEY_CACHE)?;
        write_json(self.local.as_ref(), keys::SESSION, &Session::anonymous())?;
        self.user = Some(User::anonymous());
        self.anon = true;
        tracing::info!("AUTH_GUEST");
        self.user.as_ref().ok_or(AuthError::NotSignedIn)
    }

    fn signed_in_account(&self) -> Result<&User, AuthError> {
        match &self.user {
            Some(user) if !self.anon => Ok(user),
            _ => Err(AuthError::NotSignedIn),
        }
    }

    /// Edit the signed-in account's profile fields.
    pub fn update_profile(&mut self, update: ProfileUpdate) -> Result<&User, AuthError> {
        let email = self.signed_in_account()?.email.clone();

        if let Some(fullname) = &update.fullname {
            if fullname.trim().is_empty() {
                return Err(AuthError::MissingField("Full name"));
            }
        }

        let mut users = self.load_users();
        let stored = users
            .iter_mut()
            .find(|u| u.has_email(&email))
            .ok_or(AuthError::NotFound)?;

        if let Some(fullname) = update.fullname {
            stored.fullname = fullname.trim().to_string();
        }
        if let Some(studentid) = update.studentid {
            stored.studentid = studentid.trim().to_string();
        }
        if let Some(program) = update.program {
            stored.program = program.trim().to_string();
        }

        let updated = stored.clone();
        self.save_users(&users)?;
        tracing::info!("PROFILE_UPDATED | email={}", mask_email(&email));

        self.user = Some(updated);
        self.user.as_ref().ok_or(AuthError::NotSignedIn)
    }

    /// Collect the signed-in student's data for export.
    pub fn export_data(&self, contacts: &[EmergencyContact]) -> Result<AccountExport, AuthError> {
        let user = self.signed_in_account()?;
        Ok(AccountExport {
            profile: PublicProfile::from(user),
            emergency_contacts: contacts.to_vec(),
            exported_at: Utc::now(),
        })
    }

    /// Delete the signed-in account after confirming its password, then log out.
    pub fn delete_account(&mut self, password: &str) -> Result<(), AuthError> {
        let account = self.signed_in_account()?.clone();
        if !crypto::verify_password(password, &account.password_hash)? {
            return Err(AuthError::InvalidCredentials);
        }

        let mut users = self.load_users();
        let before = users.len();
        users.retain(|u| !u.has_email(&account.email));
        if users.len() == before {
            return Err(AuthError::NotFound);
        }
        self.save_users(&users)?;
        tracing::info!("ACCOUNT_DELETED | email={}", mask_email(&account.email));

        self.logout()
    }
}

/// Salt for the user's key derivation.
fn key_salt(user: &User) -> Vec<u8> {
    match hex::decode(&user.key_salt) {
        Ok(salt) if salt.len() >= 8 => salt,
        _ => format!("{}{}", LEGACY_SALT_PREFIX, user.email.trim().to_lowercase()).into_bytes(),
    }
}

/// Session-scoped key cache: the exported key and the account it belongs to.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CachedKey {
    owner: String,
    #[serde(default)]
    key_salt: String,
    #[serde(flatten)]
    key: ExportedKey,
}

/// Profile fields safe to hand back to the student.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicProfile {
    pub email: String,
    pub fullname: String,
    pub studentid: String,
    pub program: String,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for PublicProfile {
    fn from(user: &User) -> Self {
        Self {
            email: user.email.clone(),
            fullname: user.fullname.clone(),
            studentid: user.studentid.clone(),
            program: user.program.clone(),
            created_at: user.created_at,
        }
    }
}

/// Everything "Export My Data" hands out.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountExport {
    pub profile: PublicProfile,
    pub emergency_contacts: Vec<EmergencyContact>,
    pub exported_at: DateTime<Utc>,
}
