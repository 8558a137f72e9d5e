// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! The seam between the sync engine and the local contact database.

use crate::contact::Contact;

/// The local-side addition/modification/removal delta, read once at the
/// start of a sync run.
#[derive(Debug, Clone, Default)]
pub struct LocalChanges {
    /// Contacts created locally since the last sync.
    pub additions: Vec<Contact>,
    /// Contacts changed locally since the last sync.
    pub modifications: Vec<Contact>,
    /// Contacts removed locally since the last sync.
    pub removals: Vec<Contact>,
}

impl LocalChanges {
    /// Returns true when there is nothing to upsync.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.additions.is_empty() && self.modifications.is_empty() && self.removals.is_empty()
    }
}

/// The server-side delta, applied to the store once at the end of a
/// sync run. Removals are stub contacts carrying only guid and id.
#[derive(Debug, Clone, Default)]
pub struct RemoteChanges {
    /// Contacts added on the server.
    pub additions: Vec<Contact>,
    /// Contacts modified on the server.
    pub modifications: Vec<Contact>,
    /// Contacts removed on the server.
    pub removals: Vec<Contact>,
}

impl RemoteChanges {
    /// Returns true when the server reported no changes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.additions.is_empty() && self.modifications.is_empty() && self.removals.is_empty()
    }

    /// Appends another per-addressbook delta to this coalesced one.
    pub fn extend(&mut self, other: Self) {
        self.additions.extend(other.additions);
        self.modifications.extend(other.modifications);
        self.removals.extend(other.removals);
    }
}

/// Abstract local contact store.
///
/// The engine never touches the contact database directly; the syncer
/// performs one read at the start of a run and one write at the end.
pub trait ContactStore {
    /// Store-specific error type.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Reads the local A/M/R delta accumulated since the last sync.
    ///
    /// # Errors
    ///
    /// Returns an error when the store cannot be read.
    fn local_changes(&mut self) -> Result<LocalChanges, Self::Error>;

    /// Applies the remote A/M/R delta to the store.
    ///
    /// Returns the `(guid, local id)` pairs assigned to newly created
    /// contacts so the syncer can record them in the persistent state.
    ///
    /// # Errors
    ///
    /// Returns an error when the store cannot be written.
    fn apply_remote_changes(
        &mut self,
        changes: &RemoteChanges,
    ) -> Result<Vec<(String, String)>, Self::Error>;
}
