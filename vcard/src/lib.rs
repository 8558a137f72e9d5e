// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! vCard 3.0 parsing, formatting and contact conversion (RFC 2426).

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

mod convert;
mod document;
mod error;
mod photo;
mod property;
mod syntax;

pub use crate::convert::{export_vcard, import_vcard, supported_property_names};
pub use crate::document::Document;
pub use crate::error::VCardError;
pub use crate::photo::{export_photo_property, import_photo_property};
pub use crate::property::{Parameter, Property};
