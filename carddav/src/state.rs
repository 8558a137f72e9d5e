// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Persistent synchronization state.
//!
//! The enclosing framework owns these maps as an opaque blob and hands
//! them back at the start of every run; the engine borrows them
//! exclusively for the duration of one sync.

use std::collections::HashMap;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::CardDavError;

/// Synchronization state, reloaded at the start of each run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncState {
    /// Address-book URL → last observed CTag.
    #[serde(default)]
    pub addressbook_ctags: HashMap<String, String>,
    /// Address-book URL → last observed sync token.
    #[serde(default)]
    pub addressbook_sync_tokens: HashMap<String, String>,
    /// Address-book URL → GUIDs of the contacts it contains.
    #[serde(default)]
    pub addressbook_contact_guids: HashMap<String, Vec<String>>,
    /// GUID → server-side UID (the vCard `UID` value).
    #[serde(default)]
    pub contact_uids: HashMap<String, String>,
    /// GUID → server path of the contact resource.
    #[serde(default)]
    pub contact_uris: HashMap<String, String>,
    /// GUID → last observed `ETag`.
    #[serde(default)]
    pub contact_etags: HashMap<String, String>,
    /// GUID → local contact-store identifier.
    #[serde(default)]
    pub contact_ids: HashMap<String, String>,
    /// GUID → verbatim vCard lines preserved for round-trip.
    #[serde(default)]
    pub contact_unsupported_properties: HashMap<String, Vec<String>>,
}

impl SyncState {
    /// Deserializes the state from the framework's blob.
    ///
    /// # Errors
    ///
    /// Returns an error when the blob is not valid state JSON.
    pub fn from_json(blob: &[u8]) -> Result<Self, CardDavError> {
        Ok(serde_json::from_slice(blob)?)
    }

    /// Serializes the state into the framework's blob.
    ///
    /// # Errors
    ///
    /// Returns an error when serialization fails.
    pub fn to_json(&self) -> Result<Vec<u8>, CardDavError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Removes every per-GUID entry of a contact in one operation.
    pub fn forget_contact(&mut self, guid: &str, addressbook_url: &str) {
        self.contact_uids.remove(guid);
        self.contact_uris.remove(guid);
        self.contact_etags.remove(guid);
        self.contact_ids.remove(guid);
        self.contact_unsupported_properties.remove(guid);
        if let Some(guids) = self.addressbook_contact_guids.get_mut(addressbook_url) {
            guids.retain(|g| g != guid);
        }
    }

    /// Rekeys a legacy GUID to its addressbook-specific form across
    /// every map in one operation.
    pub fn migrate_guid(&mut self, old: &str, new: &str, addressbook_url: &str) {
        fn rekey<V>(map: &mut HashMap<String, V>, old: &str, new: &str) {
            if let Some(value) = map.remove(old) {
                map.insert(new.to_string(), value);
            }
        }

        rekey(&mut self.contact_uids, old, new);
        rekey(&mut self.contact_uris, old, new);
        rekey(&mut self.contact_etags, old, new);
        rekey(&mut self.contact_ids, old, new);
        rekey(&mut self.contact_unsupported_properties, old, new);

        let guids = self
            .addressbook_contact_guids
            .entry(addressbook_url.to_string())
            .or_default();
        guids.retain(|g| g != old);
        if !guids.iter().any(|g| g == new) {
            guids.push(new.to_string());
        }
    }
}

/// Formats the addressbook-specific sync GUID of a contact.
#[must_use]
pub fn format_guid(account_id: u32, addressbook_url: &str, uid: &str) -> String {
    format!("{account_id}:AB:{addressbook_url}:{uid}")
}

/// Formats the legacy (pre-addressbook) GUID form.
#[must_use]
pub fn legacy_guid(account_id: u32, uid: &str) -> String {
    format!("{account_id}:{uid}")
}

/// Transforms a guid of any historical form into the current
/// addressbook-specific form.
///
/// GUIDs already qualified for a different address book are returned
/// unchanged rather than mangled a second time.
#[must_use]
pub fn addressbook_specific_guid(guid: &str, account_id: u32, addressbook_url: &str) -> String {
    let current_prefix = format!("{account_id}:AB:{addressbook_url}:");
    if guid.starts_with(&current_prefix) {
        // nothing to do, already a guid for this addressbook
        return guid.to_string();
    }
    if guid.starts_with(&format!("{account_id}:AB:")) {
        warn!("guid for different addressbook: {guid}");
        return guid.to_string();
    }
    let account_prefix = format!("{account_id}:");
    if let Some(uid) = guid.strip_prefix(&account_prefix) {
        // legacy accountId-prefixed form from before addressbook-scoped guids
        format_guid(account_id, addressbook_url, uid)
    } else {
        // non-prefixed, device-side guid (a local contact addition)
        format_guid(account_id, addressbook_url, guid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn populated(guid: &str, ab: &str) -> SyncState {
        let mut state = SyncState::default();
        state.contact_uids.insert(guid.to_string(), "uid1".to_string());
        state
            .contact_uris
            .insert(guid.to_string(), format!("{ab}/uid1.vcf"));
        state
            .contact_etags
            .insert(guid.to_string(), "\"e1\"".to_string());
        state.contact_ids.insert(guid.to_string(), "local-7".to_string());
        state
            .contact_unsupported_properties
            .insert(guid.to_string(), vec!["X-THING:1".to_string()]);
        state
            .addressbook_contact_guids
            .insert(ab.to_string(), vec![guid.to_string()]);
        state
    }

    #[test]
    fn guid_format_is_addressbook_scoped() {
        assert_eq!(format_guid(5, "/ab", "uid1"), "5:AB:/ab:uid1");
        assert_eq!(legacy_guid(5, "uid1"), "5:uid1");
    }

    #[test]
    fn same_uid_in_two_addressbooks_yields_distinct_guids() {
        assert_ne!(format_guid(5, "/ab1", "uid1"), format_guid(5, "/ab2", "uid1"));
    }

    #[test]
    fn transform_keeps_current_form() {
        let guid = format_guid(5, "/ab", "uid1");
        assert_eq!(addressbook_specific_guid(&guid, 5, "/ab"), guid);
    }

    #[test]
    fn transform_keeps_other_addressbook_form() {
        let other = format_guid(5, "/other", "uid1");
        assert_eq!(addressbook_specific_guid(&other, 5, "/ab"), other);
    }

    #[test]
    fn transform_migrates_legacy_form() {
        assert_eq!(
            addressbook_specific_guid("5:uid1", 5, "/ab"),
            "5:AB:/ab:uid1"
        );
    }

    #[test]
    fn transform_qualifies_device_side_guid() {
        assert_eq!(
            addressbook_specific_guid("uid1", 5, "/ab"),
            "5:AB:/ab:uid1"
        );
    }

    #[test]
    fn forget_contact_is_atomic() {
        let guid = format_guid(5, "/ab", "uid1");
        let mut state = populated(&guid, "/ab");
        state.forget_contact(&guid, "/ab");

        assert!(state.contact_uids.is_empty());
        assert!(state.contact_uris.is_empty());
        assert!(state.contact_etags.is_empty());
        assert!(state.contact_ids.is_empty());
        assert!(state.contact_unsupported_properties.is_empty());
        assert!(
            state
                .addressbook_contact_guids
                .get("/ab")
                .is_some_and(Vec::is_empty)
        );
    }

    #[test]
    fn migrate_guid_rekeys_every_map() {
        let old = legacy_guid(5, "uid1");
        let new = format_guid(5, "/ab", "uid1");
        let mut state = populated(&old, "/ab");
        state.migrate_guid(&old, &new, "/ab");

        assert_eq!(state.contact_uids.get(&new).map(String::as_str), Some("uid1"));
        assert!(!state.contact_uids.contains_key(&old));
        assert_eq!(
            state.contact_ids.get(&new).map(String::as_str),
            Some("local-7")
        );
        let guids = state.addressbook_contact_guids.get("/ab").expect("guids");
        assert_eq!(guids, &vec![new]);
    }

    #[test]
    fn state_round_trips_through_blob() {
        let guid = format_guid(5, "/ab", "uid1");
        let mut state = populated(&guid, "/ab");
        state
            .addressbook_sync_tokens
            .insert("/ab".to_string(), "st1".to_string());
        state
            .addressbook_ctags
            .insert("/ab".to_string(), "ct1".to_string());

        let blob = state.to_json().expect("serialize");
        let restored = SyncState::from_json(&blob).expect("deserialize");
        assert_eq!(state, restored);
    }
}
