// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Emergency contacts.
//!
//! An ordered list of trusted people kept under its own storage key. It is
//! independent of the account lifecycle: logging out or switching to guest
//! mode does not touch it.

use std::sync::Arc;

use crate::error::ContactError;
use crate::storage::{keys, read_json_or, write_json, Storage};
use crate::types::EmergencyContact;
use crate::utils::generate_id;

pub struct EmergencyContacts {
    storage: Arc<dyn Storage>,
    contacts: Vec<EmergencyContact>,
}

impl EmergencyContacts {
    /// Load the saved list. Missing or unreadable data yields an empty list.
    pub fn load(storage: Arc<dyn Storage>) -> Self {
        let contacts: Vec<EmergencyContact> =
            read_json_or(storage.as_ref(), keys::CONTACTS, Vec::new());
        tracing::debug!("CONTACTS_LOADED | count={}", contacts.len());
        Self { storage, contacts }
    }

    /// Append a contact and persist the list.
    pub fn add(&mut self, name: &str, phone: &str) -> Result<EmergencyContact, ContactError> {
        let name = name.trim();
        let phone = phone.trim();
        if name.is_empty() {
            return Err(ContactError::MissingField("name"));
        }
        if phone.is_empty() {
            return Err(ContactError::MissingField("phone"));
        }

        let contact = EmergencyContact {
            id: generate_id(),
            name: name.to_string(),
            phone: phone.to_string(),
        };
        let mut contacts = self.contacts.clone();
        contacts.push(contact.clone());
        write_json(self.storage.as_ref(), keys::CONTACTS, &contacts)?;
        self.contacts = contacts;

        tracing::info!("CONTACT_ADDED | count={}", self.contacts.len());
        Ok(contact)
    }

    /// Remove the contact with `id`. Returns whether anything was removed.
    pub fn remove(&mut self, id: &str) -> Result<bool, ContactError> {
        let Some(index) = self.contacts.iter().position(|c| c.id == id) else {
            return Ok(false);
        };

        let mut contacts = self.contacts.clone();
        contacts.remove(index);
        write_json(self.storage.as_ref(), keys::CONTACTS, &contacts)?;
        self.contacts = contacts;

        tracing::info!("CONTACT_REMOVED | count={}", self.contacts.len());
        Ok(true)
    }

    pub fn list(&self) -> &[EmergencyContact] {
        &self.contacts
    }

    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }

    pub fn len(&self) -> usize {
        self.contacts.len()
    }
}
