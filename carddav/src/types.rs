// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Typed structures exchanged between the parser and the engine.

use abook_core::Contact;

/// Metadata for a remote address book, as reported by the Depth:1
/// enumeration of the home set.
///
/// Either version marker may be absent; when both are, the engine must
/// fall back to a full `ETag` listing to compute the delta.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressBookInfo {
    /// Server path of the address book collection.
    pub url: String,
    /// Collection-level version marker, when reported.
    pub ctag: Option<String>,
    /// WebDAV-Sync token, when the server supports sync-collection.
    pub sync_token: Option<String>,
    /// Human-readable name, when reported.
    pub display_name: Option<String>,
}

/// The kind of change a contact resource underwent on the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModificationKind {
    /// The resource is new to this account.
    Addition,
    /// The resource exists locally and its `ETag` changed.
    Modification,
    /// The resource was removed on the server.
    Deletion,
}

/// A single entry of the server-side delta, produced both by the
/// sync-collection REPORT and by the manually computed `ETag` diff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactInfo {
    /// Normalized server path of the contact resource.
    pub uri: String,
    /// Current `ETag`, empty for deletions.
    pub etag: String,
    /// What happened to the resource.
    pub kind: ModificationKind,
    /// The sync GUID, when the resource is already known locally.
    pub guid: Option<String>,
}

/// A fully fetched contact resource, keyed by its server path.
#[derive(Debug, Clone)]
pub struct FullContactInformation {
    /// The converted contact, with its sync GUID stamped.
    pub contact: Contact,
    /// Verbatim property lines the converter does not model.
    pub unsupported_properties: Vec<String>,
    /// `ETag` of the fetched representation.
    pub etag: String,
    /// The raw server-side UID (the vCard `UID` value).
    pub uid: String,
}
