// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! HTTP client wrapper with authentication and `ETag` handling.

use reqwest::{Client, RequestBuilder, Response, StatusCode};

use crate::config::{AuthMethod, CardDavConfig};
use crate::error::CardDavError;

/// HTTP client for `CardDAV` operations.
///
/// Redirects are never followed automatically: the discovery state
/// machine inspects 3xx responses itself and treats most of them as
/// unsafe.
#[derive(Debug)]
pub struct HttpClient {
    client: Client,
    auth: AuthMethod,
}

impl HttpClient {
    /// Creates a new HTTP client.
    ///
    /// # Errors
    ///
    /// Returns an error if HTTP client creation fails.
    pub fn new(config: &CardDavConfig) -> Result<Self, CardDavError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .user_agent(&config.user_agent)
            .redirect(reqwest::redirect::Policy::none())
            .danger_accept_invalid_certs(config.ignore_ssl_errors)
            .build()?;
        Ok(Self {
            client,
            auth: config.auth.clone(),
        })
    }

    /// Builds a request with authentication headers.
    pub fn build_request(&self, method: reqwest::Method, url: &str) -> RequestBuilder {
        let mut req = self.client.request(method, url);

        match &self.auth {
            AuthMethod::Basic { username, password } => {
                req = req.basic_auth(username, Some(password));
            }
            AuthMethod::Bearer { token } => {
                req = req.bearer_auth(token);
            }
            AuthMethod::None => {}
        }

        req
    }

    /// Executes a request, mapping transport failures but passing every
    /// HTTP status through. Discovery fallbacks, the sync-token retry
    /// and the read-only-collection upsync path all need to see error
    /// statuses rather than have them converted.
    ///
    /// # Errors
    ///
    /// Returns an error when the request produced no response at all.
    pub async fn execute_raw(&self, req: RequestBuilder) -> Result<Response, CardDavError> {
        Ok(req.send().await?)
    }

    /// Executes a request and checks for HTTP errors.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or returns an error status
    /// code.
    pub async fn execute(&self, req: RequestBuilder) -> Result<Response, CardDavError> {
        let resp = self.execute_raw(req).await?;
        let status = resp.status();
        if Self::is_success(status) {
            Ok(resp)
        } else {
            let message = resp
                .text()
                .await
                .unwrap_or_else(|_| "unable to read response".to_string());
            Err(CardDavError::Http {
                status: status.as_u16(),
                message,
            })
        }
    }

    /// Whether a status counts as success for DAV operations.
    #[must_use]
    pub fn is_success(status: StatusCode) -> bool {
        status.is_success() || status == StatusCode::MULTI_STATUS
    }

    /// Adds an `If-Match` header for conditional updates and deletions.
    #[must_use]
    pub fn if_match(req: RequestBuilder, etag: &str) -> RequestBuilder {
        req.header("If-Match", etag)
    }

    /// Adds `If-None-Match: *` so a PUT only creates, never overwrites.
    #[must_use]
    pub fn if_none_match_any(req: RequestBuilder) -> RequestBuilder {
        req.header("If-None-Match", "*")
    }

    /// Extracts the `ETag` from response headers. Header name lookup is
    /// case-insensitive; servers disagree on the spelling.
    #[must_use]
    pub fn extract_etag(resp: &Response) -> Option<String> {
        resp.headers()
            .get("etag")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    }
}
