// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use std::fmt;

/// `CardDAV` engine errors.
#[non_exhaustive]
#[derive(Debug)]
pub enum CardDavError {
    /// The server answered with an error status.
    Http {
        /// The HTTP status code.
        status: u16,
        /// Response body or a short description.
        message: String,
    },

    /// The request never produced a response.
    Transport(String),

    /// TLS failure while the account forbids ignoring SSL errors.
    Ssl(String),

    /// The transport timed out.
    Timeout,

    /// A circular redirect, or a redirect from a path discovery does
    /// not trust.
    Redirect(String),

    /// XML parsing/writing error.
    Xml(String),

    /// vCard conversion error.
    VCard(String),

    /// The server response lacked required data.
    InvalidResponse(String),

    /// Configuration error.
    Config(String),

    /// The local contact store failed.
    Store(String),
}

impl CardDavError {
    /// The HTTP status code to report through the framework's error
    /// callback, when one applies. Protocol and parse failures have
    /// none.
    #[must_use]
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            Self::Ssl(_) => Some(401),
            Self::Timeout => Some(408),
            Self::Redirect(_) => Some(301),
            _ => None,
        }
    }
}

impl fmt::Display for CardDavError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http { status, message } => write!(f, "HTTP error {status}: {message}"),
            Self::Transport(e) => write!(f, "transport error: {e}"),
            Self::Ssl(e) => write!(f, "SSL error: {e}"),
            Self::Timeout => write!(f, "request timed out"),
            Self::Redirect(e) => write!(f, "refused redirect: {e}"),
            Self::Xml(e) => write!(f, "XML error: {e}"),
            Self::VCard(e) => write!(f, "vCard conversion error: {e}"),
            Self::InvalidResponse(e) => write!(f, "invalid server response: {e}"),
            Self::Config(e) => write!(f, "configuration error: {e}"),
            Self::Store(e) => write!(f, "contact store error: {e}"),
        }
    }
}

impl std::error::Error for CardDavError {}

impl From<reqwest::Error> for CardDavError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            return Self::Timeout;
        }

        // reqwest does not expose TLS failures as a distinct kind;
        // inspect the source chain.
        let mut chain = String::new();
        let mut source: Option<&(dyn std::error::Error + 'static)> = Some(&e);
        while let Some(err) = source {
            chain.push_str(&err.to_string());
            chain.push(' ');
            source = err.source();
        }
        let lowered = chain.to_ascii_lowercase();
        if lowered.contains("certificate") || lowered.contains("tls") || lowered.contains("ssl") {
            Self::Ssl(e.to_string())
        } else {
            Self::Transport(e.to_string())
        }
    }
}

impl From<quick_xml::Error> for CardDavError {
    fn from(e: quick_xml::Error) -> Self {
        Self::Xml(e.to_string())
    }
}

impl From<std::io::Error> for CardDavError {
    fn from(e: std::io::Error) -> Self {
        Self::Xml(format!("IO error: {e}"))
    }
}

impl From<abook_vcard::VCardError> for CardDavError {
    fn from(e: abook_vcard::VCardError) -> Self {
        Self::VCard(e.to_string())
    }
}

impl From<serde_json::Error> for CardDavError {
    fn from(e: serde_json::Error) -> Self {
        Self::Store(format!("sync state blob: {e}"))
    }
}
