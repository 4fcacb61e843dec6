//! Running index of phone numbers and emails already known to the CRM

use std::collections::HashSet;

use crate::types::ExistingContacts;

use super::phone::national_key;

/// Phones (as national digit keys) and lower-cased emails seen so far.
///
/// Seeded from the store at the start of a run and grown with every
/// accepted row, so repeats inside one file are caught as well.
#[derive(Debug, Default)]
pub struct DuplicateIndex {
    phones: HashSet<String>,
    emails: HashSet<String>,
}

impl DuplicateIndex {
    pub fn seeded(existing: &ExistingContacts) -> Self {
        let mut index = Self::default();
        for phone in &existing.phones {
            index.add_phone(phone);
        }
        for email in &existing.emails {
            index.add_email(email);
        }
        index
    }

    pub fn has_phone(&self, value: &str) -> bool {
        let key = national_key(value);
        !key.is_empty() && self.phones.contains(&key)
    }

    pub fn has_email(&self, value: &str) -> bool {
        let key = value.trim().to_lowercase();
        !key.is_empty() && self.emails.contains(&key)
    }

    pub fn add_phone(&mut self, value: &str) {
        let key = national_key(value);
        if !key.is_empty() {
            self.phones.insert(key);
        }
    }

    pub fn add_email(&mut self, value: &str) {
        let key = value.trim().to_lowercase();
        if !key.is_empty() {
            self.emails.insert(key);
        }
    }

    pub fn phone_count(&self) -> usize {
        self.phones.len()
    }

    pub fn email_count(&self) -> usize {
        self.emails.len()
    }
}
