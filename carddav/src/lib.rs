// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! `CardDAV` synchronization engine (RFC 6352, RFC 6578, RFC 6764).
//!
//! Discovers the remote address books of an account, computes the
//! addition/modification/removal delta in both directions, and keeps
//! the persistent per-contact sync state that makes the next run
//! incremental.

#![warn(
    trivial_casts,
    trivial_numeric_casts,
    missing_copy_implementations,
    missing_debug_implementations,
    missing_docs,
    unsafe_code,
    unstable_features,
    unused_import_braces,
    unused_qualifications,
    clippy::dbg_macro,
    clippy::indexing_slicing,
    clippy::pedantic
)]
// Allow certain clippy lints that are too restrictive for this crate
#![allow(
    clippy::module_name_repetitions,
    clippy::similar_names,
    clippy::single_match_else,
    clippy::match_bool
)]

mod config;
mod engine;
mod error;
mod http;
mod request;
mod response;
mod state;
mod syncer;
mod types;
mod xml;

pub use crate::config::{AuthMethod, CardDavConfig};
pub use crate::engine::CardDavEngine;
pub use crate::error::CardDavError;
pub use crate::request::{
    AddressbookMultigetRequest, AddressbookQueryRequest, Prop, PropFindRequest, RequestGenerator,
    SyncCollectionRequest,
};
pub use crate::response::{
    MultiStatusResponse, PrincipalResponse, normalize_href, parse_addressbook_home,
    parse_addressbook_information, parse_contact_data, parse_contact_metadata,
    parse_sync_token_delta, parse_user_principal,
};
pub use crate::state::{SyncState, addressbook_specific_guid, format_guid, legacy_guid};
pub use crate::syncer::{Syncer, default_significant_differences};
pub use crate::types::{
    AddressBookInfo, ContactInfo, FullContactInformation, ModificationKind,
};
