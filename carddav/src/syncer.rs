// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! The outward-facing sync orchestrator.
//!
//! Bridges the engine to the local contact store: one store read at the
//! start of a run for the local A/M/R, one store write at the end for
//! the remote A/M/R, with the per-address-book upsync in between.

use std::collections::BTreeMap;
use std::fmt;

use abook_core::{Contact, ContactStore, Detail, Gender, LocalChanges, RemoteChanges};
use log::{debug, warn};

use crate::config::CardDavConfig;
use crate::engine::CardDavEngine;
use crate::error::CardDavError;
use crate::state::SyncState;

/// The predicate deciding whether two contact versions differ
/// meaningfully.
pub type SignificantDifferences = dyn Fn(&Contact, &Contact) -> bool + Send + Sync;

/// Orchestrates one account's synchronization runs.
pub struct Syncer<S: ContactStore> {
    config: CardDavConfig,
    store: S,
    state: SyncState,
    significant: Option<Box<SignificantDifferences>>,
}

impl<S: ContactStore> fmt::Debug for Syncer<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Syncer")
            .field("config", &self.config)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl<S: ContactStore> Syncer<S> {
    /// Creates a syncer with empty state (a first-time sync).
    #[must_use]
    pub fn new(config: CardDavConfig, store: S) -> Self {
        Self {
            config,
            store,
            state: SyncState::default(),
            significant: None,
        }
    }

    /// Restores the persistent state from the framework's blob.
    ///
    /// # Errors
    ///
    /// Returns an error when the blob cannot be decoded.
    pub fn load_state_blob(&mut self, blob: &[u8]) -> Result<(), CardDavError> {
        self.state = SyncState::from_json(blob)?;
        Ok(())
    }

    /// Serializes the persistent state for the framework to keep.
    ///
    /// # Errors
    ///
    /// Returns an error when serialization fails.
    pub fn state_blob(&self) -> Result<Vec<u8>, CardDavError> {
        self.state.to_json()
    }

    /// The current persistent state.
    #[must_use]
    pub fn state(&self) -> &SyncState {
        &self.state
    }

    /// Replaces the persistent state wholesale.
    pub fn set_state(&mut self, state: SyncState) {
        self.state = state;
    }

    /// Overrides the built-in significant-difference predicate.
    pub fn set_significant_differences<F>(&mut self, predicate: F)
    where
        F: Fn(&Contact, &Contact) -> bool + Send + Sync + 'static,
    {
        self.significant = Some(Box::new(predicate));
    }

    /// Discovery-only mode: returns the account's address-book paths
    /// without touching contacts or state.
    ///
    /// # Errors
    ///
    /// Returns an error on any fatal discovery failure.
    pub async fn list_addressbooks(&mut self) -> Result<Vec<String>, CardDavError> {
        let mut engine = CardDavEngine::new(self.config.clone(), &mut self.state)?;
        engine.list_addressbooks().await
    }

    /// Runs one full bidirectional sync and returns the remote changes
    /// that were applied to the store.
    ///
    /// # Errors
    ///
    /// Returns an error on any fatal failure. Partial progress on the
    /// local store is not rolled back; the next run reconciles.
    pub async fn sync(&mut self) -> Result<RemoteChanges, CardDavError> {
        let local = self
            .store
            .local_changes()
            .map_err(|e| CardDavError::Store(e.to_string()))?;
        debug!(
            "local changes to upsync: {} {} {}",
            local.additions.len(),
            local.modifications.len(),
            local.removals.len()
        );

        let mut engine = CardDavEngine::new(self.config.clone(), &mut self.state)?;
        let remote = engine.fetch_remote_changes().await?;

        let groups = group_local_changes(&engine, &local);
        let predicate: &(dyn Fn(&Contact, &Contact) -> bool) = match &self.significant {
            Some(predicate) => predicate.as_ref(),
            None => &default_significant_differences,
        };
        for (addressbook, changes) in &groups {
            engine.upsync(addressbook, changes, predicate).await?;
        }
        debug!("upsync complete");
        drop(engine);

        let new_ids = self
            .store
            .apply_remote_changes(&remote)
            .map_err(|e| CardDavError::Store(e.to_string()))?;
        for (guid, id) in new_ids {
            self.state.contact_ids.insert(guid, id);
        }

        Ok(remote)
    }
}

/// Buckets the local A/M/R by target address book: additions go to the
/// default address book, modifications and removals to the book that
/// already contains their guid.
fn group_local_changes(
    engine: &CardDavEngine<'_>,
    local: &LocalChanges,
) -> Vec<(String, LocalChanges)> {
    let mut groups: BTreeMap<String, LocalChanges> = BTreeMap::new();
    let default_addressbook = engine.default_addressbook().map(str::to_string);

    for contact in &local.additions {
        let Some(addressbook) = default_addressbook.clone() else {
            warn!("no addressbook available for local addition, skipping");
            continue;
        };
        groups
            .entry(addressbook)
            .or_default()
            .additions
            .push(contact.clone());
    }

    for contact in &local.modifications {
        let guid = contact.guid_str();
        if guid.is_empty() {
            warn!("locally modified contact has no guid, skipping");
            continue;
        }
        let Some(addressbook) = engine
            .addressbook_for_guid(guid)
            .or_else(|| default_addressbook.clone())
        else {
            warn!("no addressbook found for modified contact {guid}, skipping");
            continue;
        };
        groups
            .entry(addressbook)
            .or_default()
            .modifications
            .push(contact.clone());
    }

    for contact in &local.removals {
        let guid = contact.guid_str();
        if guid.is_empty() {
            warn!("locally removed contact has no guid, skipping");
            continue;
        }
        let Some(addressbook) = engine
            .addressbook_for_guid(guid)
            .or_else(|| default_addressbook.clone())
        else {
            warn!("no addressbook found for removed contact {guid}, skipping");
            continue;
        };
        groups
            .entry(addressbook)
            .or_default()
            .removals
            .push(contact.clone());
    }

    groups.into_iter().collect()
}

/// The built-in significant-difference predicate: compares the
/// supported-property subset by value, ignoring modifiable markers,
/// local ids, guids and the REV timestamp.
#[must_use]
pub fn default_significant_differences(a: &Contact, b: &Contact) -> bool {
    fn value<T: Clone>(detail: &Option<Detail<T>>) -> Option<T> {
        detail.as_ref().map(|d| d.value.clone())
    }
    fn values<T: Clone>(details: &[Detail<T>]) -> Vec<T> {
        details.iter().map(|d| d.value.clone()).collect()
    }
    fn gender(contact: &Contact) -> Gender {
        value(&contact.gender).unwrap_or_default()
    }

    value(&a.name) != value(&b.name)
        || value(&a.display_label) != value(&b.display_label)
        || value(&a.nickname) != value(&b.nickname)
        || value(&a.birthday) != value(&b.birthday)
        || gender(a) != gender(b)
        || value(&a.organization) != value(&b.organization)
        || value(&a.title) != value(&b.title)
        || value(&a.role) != value(&b.role)
        || values(&a.emails) != values(&b.emails)
        || values(&a.phones) != values(&b.phones)
        || values(&a.addresses) != values(&b.addresses)
        || values(&a.urls) != values(&b.urls)
        || values(&a.photos) != values(&b.photos)
}

#[cfg(test)]
mod tests {
    use super::*;
    use abook_core::EmailAddress;

    fn contact_with_email(address: &str) -> Contact {
        Contact {
            emails: vec![Detail::new(EmailAddress {
                address: address.to_string(),
                types: Vec::new(),
            })],
            ..Contact::default()
        }
    }

    #[test]
    fn identical_content_is_not_significant() {
        let mut a = contact_with_email("a@example.org");
        let mut b = contact_with_email("a@example.org");
        // markers, ids, guids and timestamps must not count
        a.mark_all_modifiable();
        a.id = Some("local-1".to_string());
        a.guid = Some(Detail::new("uid-raw".to_string()));
        b.guid = Some(Detail::new("5:AB:/ab:uid-raw".to_string()));
        b.timestamp = Some(Detail::new("2026-01-01T00:00:00Z".to_string()));

        assert!(!default_significant_differences(&a, &b));
    }

    #[test]
    fn changed_email_is_significant() {
        let a = contact_with_email("a@example.org");
        let b = contact_with_email("b@example.org");
        assert!(default_significant_differences(&a, &b));
    }

    #[test]
    fn unspecified_gender_equals_absent_gender() {
        let a = contact_with_email("a@example.org");
        let mut b = contact_with_email("a@example.org");
        b.gender = Some(Detail::new(Gender::Unspecified));
        assert!(!default_significant_differences(&a, &b));
    }
}
