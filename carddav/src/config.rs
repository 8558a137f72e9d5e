// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

/// `CardDAV` authentication method.
#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(tag = "type")]
pub enum AuthMethod {
    /// No authentication.
    #[serde(rename = "none")]
    #[default]
    None,
    /// Basic authentication (username/password).
    #[serde(rename = "basic")]
    Basic {
        /// Username for authentication.
        username: String,
        /// Password for authentication.
        password: String,
    },
    /// Bearer token authentication (OAuth).
    #[serde(rename = "bearer")]
    Bearer {
        /// Bearer access token.
        token: String,
    },
}

/// `CardDAV` account configuration.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct CardDavConfig {
    /// Server URL supplied by the user. Discovery may replace it when
    /// the well-known bootstrap is redirected.
    pub server_url: String,
    /// Address-book or home-set path supplied by the user, when known.
    /// Skips principal discovery.
    #[serde(default)]
    pub addressbook_path: Option<String>,
    /// Account identifier, used as the sync GUID prefix.
    pub account_id: u32,
    /// Authentication method.
    #[serde(default)]
    pub auth: AuthMethod,
    /// Whether TLS errors are ignored for this account. When false,
    /// any SSL failure aborts the sync.
    #[serde(default)]
    pub ignore_ssl_errors: bool,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// User agent string.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

const fn default_timeout() -> u64 {
    30
}

fn default_user_agent() -> String {
    concat!("abook-carddav/", env!("CARGO_PKG_VERSION")).to_string()
}

impl Default for CardDavConfig {
    fn default() -> Self {
        Self {
            server_url: String::new(),
            addressbook_path: None,
            account_id: 0,
            auth: AuthMethod::default(),
            ignore_ssl_errors: false,
            timeout_secs: default_timeout(),
            user_agent: default_user_agent(),
        }
    }
}
