// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

/// Errors that can occur when parsing vCard text.
#[non_exhaustive]
#[derive(Debug, Clone, thiserror::Error)]
pub enum VCardError {
    /// The input did not contain exactly one vCard document.
    #[error("expected a single vCard document, found {0}")]
    DocumentCount(usize),

    /// A content line had no property name before its separator.
    #[error("content line has no property name: {0:?}")]
    MissingName(String),

    /// A content line had no colon separating name from value.
    #[error("content line has no colon separator: {0:?}")]
    MissingColon(String),

    /// A property appeared outside BEGIN:VCARD/END:VCARD, or a marker
    /// was missing.
    #[error("unbalanced BEGIN:VCARD/END:VCARD markers")]
    UnbalancedDocument,
}
