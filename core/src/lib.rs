// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Contact data model shared by the addressbook sync engine.

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
#![allow(clippy::module_name_repetitions)]

mod contact;
mod label;
mod store;

pub use crate::contact::{
    Contact, Detail, EmailAddress, Gender, Name, PhoneNumber, Photo, PhotoKind, PostalAddress,
    Website,
};
pub use crate::label::{decompose_display_label, generate_display_label};
pub use crate::store::{ContactStore, LocalChanges, RemoteChanges};
