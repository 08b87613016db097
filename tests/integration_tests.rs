// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Integration tests for mindguard
//!
//! These exercise the library the way the binary does: file-backed stores in
//! a temporary directory, reopened between steps to simulate restarts.

use std::sync::Arc;

use mindguard::auth::AuthContext;
use mindguard::companion::classifier::{ANXIETY_REPLY, CRISIS_REPLY, GENERAL_REPLIES, SADNESS_REPLY};
use mindguard::companion::{Classifier, ReplyCategory};
use mindguard::contacts::EmergencyContacts;
use mindguard::error::AuthError;
use mindguard::security::{derive_key, hash_password_with_salt};
use mindguard::storage::{keys, read_json, write_json, FileStorage, Storage};
use mindguard::types::{NewUser, Session, User};
use tempfile::TempDir;

struct Stores {
    _dir: TempDir,
    local: Arc<dyn Storage>,
    session: Arc<dyn Storage>,
}

impl Stores {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let local: Arc<dyn Storage> = Arc::new(FileStorage::open(dir.path().join("local")).unwrap());
        let session: Arc<dyn Storage> = Arc::new(FileStorage::open(dir.path().join("session")).unwrap());
        Self {
            _dir: dir,
            local,
            session,
        }
    }

    fn bootstrap(&self) -> AuthContext {
        AuthContext::bootstrap(Arc::clone(&self.local), Arc::clone(&self.session))
    }
}

fn student(email: &str) -> NewUser {
    NewUser {
        email: email.to_string(),
        fullname: "Juan Dela Cruz".to_string(),
        studentid: "0322-0001".to_string(),
        program: "BS Psychology".to_string(),
    }
}

// =============================================================================
// Auth Flow Tests
// =============================================================================

#[test]
fn test_signup_login_restart() {
    let stores = Stores::new();

    let mut auth = stores.bootstrap();
    auth.signup(student("juan@lspu.edu.ph"), "tahimik-123").unwrap();
    assert!(auth.is_authenticated());
    assert!(!auth.is_anonymous());
    let key = auth.encryption_key().cloned().unwrap();

    // A restart in the same OS session restores the user and the cached key.
    let restored = stores.bootstrap();
    assert_eq!(restored.user().unwrap().email, "juan@lspu.edu.ph");
    assert_eq!(restored.encryption_key(), Some(&key));

    // Logging in again derives the same key.
    let mut again = stores.bootstrap();
    again.login("JUAN@lspu.edu.ph", "tahimik-123").unwrap();
    assert_eq!(again.encryption_key(), Some(&key));
}

#[test]
fn test_login_errors() {
    let stores = Stores::new();
    let mut auth = stores.bootstrap();
    auth.signup(student("juan@lspu.edu.ph"), "tahimik-123").unwrap();
    auth.logout().unwrap();

    assert!(matches!(
        auth.login("nobody@lspu.edu.ph", "tahimik-123"),
        Err(AuthError::NotFound)
    ));
    assert!(matches!(
        auth.login("juan@lspu.edu.ph", "wrong"),
        Err(AuthError::InvalidCredentials)
    ));
    assert!(!auth.is_authenticated());
}

#[test]
fn test_login_with_mismatched_stored_hash() {
    let stores = Stores::new();
    let user = User {
        email: "ana@lspu.edu.ph".to_string(),
        fullname: "Ana".to_string(),
        studentid: String::new(),
        program: String::new(),
        password_hash: hash_password_with_salt("something-else", b"fixed-test-salt").unwrap(),
        created_at: chrono::Utc::now(),
        key_salt: String::new(),
    };
    write_json(stores.local.as_ref(), keys::USERS, &vec![user]).unwrap();

    let mut auth = stores.bootstrap();
    assert!(matches!(
        auth.login("ana@lspu.edu.ph", "correct-password"),
        Err(AuthError::InvalidCredentials)
    ));
}

#[test]
fn test_login_with_matching_stored_hash() {
    let stores = Stores::new();
    let user = User {
        email: "ana@lspu.edu.ph".to_string(),
        fullname: "Ana".to_string(),
        studentid: String::new(),
        program: String::new(),
        password_hash: hash_password_with_salt("correct-password", b"fixed-test-salt").unwrap(),
        created_at: chrono::Utc::now(),
        key_salt: String::new(),
    };
    write_json(stores.local.as_ref(), keys::USERS, &vec![user]).unwrap();

    let mut auth = stores.bootstrap();
    auth.login("ana@lspu.edu.ph", "correct-password").unwrap();

    // Records without a key salt derive from the lowercased email.
    let expected = derive_key("correct-password", b"mindguard:ana@lspu.edu.ph").unwrap();
    assert_eq!(auth.encryption_key(), Some(&expected));
}

#[test]
fn test_duplicate_email_leaves_list_unchanged() {
    let stores = Stores::new();
    let mut auth = stores.bootstrap();
    auth.signup(student("juan@lspu.edu.ph"), "one").unwrap();
    let before: Vec<User> = read_json(stores.local.as_ref(), keys::USERS).unwrap().unwrap();

    assert!(matches!(
        auth.signup(student("Juan@LSPU.edu.ph"), "two"),
        Err(AuthError::DuplicateEmail)
    ));

    let after: Vec<User> = read_json(stores.local.as_ref(), keys::USERS).unwrap().unwrap();
    assert_eq!(before, after);
}

#[test]
fn test_logout_clears_session_and_key_cache() {
    let stores = Stores::new();
    let mut auth = stores.bootstrap();
    auth.signup(student("juan@lspu.edu.ph"), "tahimik-123").unwrap();
    assert!(stores.session.get_item(keys::KEY_CACHE).unwrap().is_some());

    auth.logout().unwrap();
    assert!(stores.local.get_item(keys::SESSION).unwrap().is_none());
    assert!(stores.session.get_item(keys::KEY_CACHE).unwrap().is_none());

    let restarted = stores.bootstrap();
    assert!(!restarted.is_authenticated());
    assert!(restarted.encryption_key().is_none());
    assert_eq!(restarted.users().len(), 1);
}

#[test]
fn test_guest_drops_previous_key() {
    let stores = Stores::new();
    let mut auth = stores.bootstrap();
    auth.signup(student("juan@lspu.edu.ph"), "tahimik-123").unwrap();

    auth.start_anonymous().unwrap();
    assert!(auth.is_anonymous());
    assert!(auth.encryption_key().is_none());
    assert!(stores.session.get_item(keys::KEY_CACHE).unwrap().is_none());

    let session: Session = read_json(stores.local.as_ref(), keys::SESSION).unwrap().unwrap();
    assert!(session.anon);
    assert!(session.email.is_none());

    let restarted = stores.bootstrap();
    assert!(restarted.is_anonymous());
}

#[test]
fn test_malformed_key_cache_degrades_to_no_key() {
    let stores = Stores::new();
    let mut auth = stores.bootstrap();
    auth.signup(student("juan@lspu.edu.ph"), "tahimik-123").unwrap();

    stores.session.set_item(keys::KEY_CACHE, "{\"kty\":").unwrap();
    let restarted = stores.bootstrap();
    assert!(restarted.is_authenticated());
    assert!(restarted.encryption_key().is_none());
}

#[test]
fn test_missing_key_cache_after_os_restart() {
    let stores = Stores::new();
    let mut auth = stores.bootstrap();
    auth.signup(student("juan@lspu.edu.ph"), "tahimik-123").unwrap();

    stores.session.remove_item(keys::KEY_CACHE).unwrap();
    let restarted = stores.bootstrap();
    assert_eq!(restarted.user().unwrap().fullname, "Juan Dela Cruz");
    assert!(restarted.encryption_key().is_none());
}

#[test]
fn test_shared_session_store_never_hands_over_another_key() {
    let dir = tempfile::tempdir().unwrap();
    let open = |name: &str| -> Arc<dyn Storage> { Arc::new(FileStorage::open(dir.path().join(name)).unwrap()) };
    let (local_a, local_b, session) = (open("a"), open("b"), open("session"));

    let mut a = AuthContext::bootstrap(Arc::clone(&local_a), Arc::clone(&session));
    a.signup(student("a@x.edu"), "alpha-pass").unwrap();
    let key_a = a.encryption_key().cloned().unwrap();

    let mut b = AuthContext::bootstrap(Arc::clone(&local_b), Arc::clone(&session));
    b.signup(student("b@x.edu"), "bravo-pass").unwrap();
    let key_b = b.encryption_key().cloned().unwrap();
    assert_ne!(key_a, key_b);

    let restored = AuthContext::bootstrap(Arc::clone(&local_a), Arc::clone(&session));
    assert_eq!(restored.user().unwrap().email, "a@x.edu");
    assert!(restored.encryption_key().is_none());

    // B's own restore is unaffected.
    let restored_b = AuthContext::bootstrap(local_b, session);
    assert_eq!(restored_b.encryption_key(), Some(&key_b));
}

#[test]
fn test_key_cache_from_older_build_is_ignored() {
    let stores = Stores::new();
    let mut auth = stores.bootstrap();
    auth.signup(student("juan@lspu.edu.ph"), "tahimik-123").unwrap();

    // A bare exported key carries no owner.
    let bare = auth.encryption_key().unwrap().export();
    write_json(stores.session.as_ref(), keys::KEY_CACHE, &bare).unwrap();

    let restarted = stores.bootstrap();
    assert!(restarted.is_authenticated());
    assert!(restarted.encryption_key().is_none());
}

#[test]
fn test_encrypted_export_opens_with_login_key() {
    let stores = Stores::new();
    let mut auth = stores.bootstrap();
    auth.signup(student("juan@lspu.edu.ph"), "tahimik-123").unwrap();

    let export = auth.export_data(&[]).unwrap();
    let json = serde_json::to_vec(&export).unwrap();
    let sealed = auth.encryption_key().unwrap().seal(&json, b"mindguard-export").unwrap();

    let mut later = stores.bootstrap();
    later.logout().unwrap();
    later.login("juan@lspu.edu.ph", "tahimik-123").unwrap();
    let opened = later.encryption_key().unwrap().open(&sealed, b"mindguard-export").unwrap();
    assert_eq!(opened, json);
}

// =============================================================================
// Classifier Tests
// =============================================================================

#[test]
fn test_classifier_priorities() {
    let classifier = Classifier::new();

    let crisis = classifier.respond("so sad and worried, thinking about sUiCiDe");
    assert_eq!(crisis.category, ReplyCategory::Crisis);
    assert_eq!(crisis.text, CRISIS_REPLY);

    assert_eq!(classifier.respond("I feel so sad and lonely today").text, SADNESS_REPLY);
    assert_eq!(classifier.respond("I'm scared of my defense").text, ANXIETY_REPLY);

    let general = classifier.respond("Exams are next week");
    assert!(GENERAL_REPLIES.contains(&general.text.as_str()));
}

// =============================================================================
// Contacts Tests
// =============================================================================

#[test]
fn test_contacts_round_trip_and_remove() {
    let stores = Stores::new();

    let mut contacts = EmergencyContacts::load(Arc::clone(&stores.local));
    let mama = contacts.add("Mama", "0917 000 0001").unwrap();
    let kuya = contacts.add("Kuya", "0917 000 0002").unwrap();
    let guidance = contacts.add("Guidance Office", "(049) 000 0003").unwrap();

    let reloaded = EmergencyContacts::load(Arc::clone(&stores.local));
    assert_eq!(reloaded.list(), contacts.list());

    let mut reloaded = reloaded;
    assert!(reloaded.remove(&kuya.id).unwrap());
    assert!(!reloaded.remove(&kuya.id).unwrap());

    let ids: Vec<_> = EmergencyContacts::load(Arc::clone(&stores.local))
        .list()
        .iter()
        .map(|c| c.id.clone())
        .collect();
    assert_eq!(ids, vec![mama.id, guidance.id]);
}

#[test]
fn test_contacts_survive_logout() {
    let stores = Stores::new();
    let mut auth = stores.bootstrap();
    auth.signup(student("juan@lspu.edu.ph"), "tahimik-123").unwrap();

    let mut contacts = EmergencyContacts::load(Arc::clone(&stores.local));
    contacts.add("Mama", "0917").unwrap();

    auth.logout().unwrap();
    assert_eq!(EmergencyContacts::load(Arc::clone(&stores.local)).len(), 1);
}
