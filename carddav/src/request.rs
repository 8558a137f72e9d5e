// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Request builders and dispatch for `CardDAV` operations.

use std::io::Cursor;
use std::sync::Arc;

use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use quick_xml::Writer;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use reqwest::{Method, Response};
use url::Url;

use crate::error::CardDavError;
use crate::http::HttpClient;
use crate::xml::ns;

/// Characters percent-encoded when a stored (decoded) path is put back
/// on the wire.
const PATH_ENCODE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'<')
    .add(b'>')
    .add(b'`')
    .add(b'#')
    .add(b'?')
    .add(b'{')
    .add(b'}');

/// PROPFIND request builder.
#[derive(Debug)]
pub struct PropFindRequest {
    props: Vec<Prop>,
}

/// Properties to request in PROPFIND.
#[derive(Debug, Clone, Copy)]
pub enum Prop {
    /// Display name.
    DisplayName,
    /// Resource type.
    ResourceType,
    /// `ETag`.
    GetETag,
    /// Authenticated user principal (RFC 5397).
    CurrentUserPrincipal,
    /// Address book home set.
    AddressbookHomeSet,
    /// vCard payload.
    AddressData,
    /// Collection version marker (CalendarServer extension).
    GetCTag,
    /// WebDAV-Sync token.
    SyncToken,
}

impl Prop {
    const fn name(self) -> &'static str {
        match self {
            Self::DisplayName => "displayname",
            Self::ResourceType => "resourcetype",
            Self::GetETag => "getetag",
            Self::CurrentUserPrincipal => "current-user-principal",
            Self::AddressbookHomeSet => "addressbook-home-set",
            Self::AddressData => "address-data",
            Self::GetCTag => "getctag",
            Self::SyncToken => "sync-token",
        }
    }

    const fn prefix(self) -> &'static str {
        match self {
            Self::DisplayName
            | Self::ResourceType
            | Self::GetETag
            | Self::CurrentUserPrincipal
            | Self::SyncToken => "D",
            Self::AddressbookHomeSet | Self::AddressData => "C",
            Self::GetCTag => "CS",
        }
    }
}

impl PropFindRequest {
    /// Creates a new PROPFIND request.
    #[must_use]
    pub fn new() -> Self {
        Self { props: Vec::new() }
    }

    /// Adds a property to the request.
    pub fn add_property(&mut self, prop: Prop) -> &mut Self {
        self.props.push(prop);
        self
    }

    /// Builds the XML body for the PROPFIND request.
    ///
    /// # Errors
    ///
    /// Returns an error if XML building fails.
    pub fn build(&self) -> Result<String, CardDavError> {
        let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);

        // <D:propfind xmlns:D="DAV:">
        let mut propfind = BytesStart::new("D:propfind");
        propfind.push_attribute(("xmlns:D", ns::DAV));
        if self.props.iter().any(|p| p.prefix() == "C") {
            propfind.push_attribute(("xmlns:C", ns::CARDDAV));
        }
        if self.props.iter().any(|p| p.prefix() == "CS") {
            propfind.push_attribute(("xmlns:CS", ns::CALENDARSERVER));
        }
        writer.write_event(Event::Start(propfind))?;

        // <D:prop>
        writer.write_event(Event::Start(BytesStart::new("D:prop")))?;

        // Properties
        for prop in &self.props {
            let tag = format!("{}:{}", prop.prefix(), prop.name());
            writer.write_event(Event::Start(BytesStart::new(tag.clone())))?;
            writer.write_event(Event::End(BytesEnd::new(tag)))?;
        }

        // </D:prop>
        writer.write_event(Event::End(BytesEnd::new("D:prop")))?;

        // </D:propfind>
        writer.write_event(Event::End(BytesEnd::new("D:propfind")))?;

        let bytes = writer.into_inner().into_inner();
        String::from_utf8(bytes).map_err(|e| CardDavError::Xml(format!("UTF-8 error: {e}")))
    }
}

impl Default for PropFindRequest {
    fn default() -> Self {
        Self::new()
    }
}

/// sync-collection REPORT request builder (RFC 6578).
#[derive(Debug)]
pub struct SyncCollectionRequest {
    sync_token: String,
}

impl SyncCollectionRequest {
    /// Creates a sync-collection request carrying the cached token.
    #[must_use]
    pub fn new(sync_token: String) -> Self {
        Self { sync_token }
    }

    /// Builds the XML body for the sync-collection REPORT.
    ///
    /// # Errors
    ///
    /// Returns an error if XML building fails.
    pub fn build(&self) -> Result<String, CardDavError> {
        let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);

        // <D:sync-collection xmlns:D="DAV:">
        let mut root = BytesStart::new("D:sync-collection");
        root.push_attribute(("xmlns:D", ns::DAV));
        writer.write_event(Event::Start(root))?;

        // <D:sync-token>
        writer.write_event(Event::Start(BytesStart::new("D:sync-token")))?;
        writer.write_event(Event::Text(BytesText::new(&self.sync_token)))?;
        writer.write_event(Event::End(BytesEnd::new("D:sync-token")))?;

        // <D:sync-level>1</D:sync-level>
        writer.write_event(Event::Start(BytesStart::new("D:sync-level")))?;
        writer.write_event(Event::Text(BytesText::new("1")))?;
        writer.write_event(Event::End(BytesEnd::new("D:sync-level")))?;

        // <D:prop>
        writer.write_event(Event::Start(BytesStart::new("D:prop")))?;
        writer.write_event(Event::Start(BytesStart::new("D:getetag")))?;
        writer.write_event(Event::End(BytesEnd::new("D:getetag")))?;
        writer.write_event(Event::End(BytesEnd::new("D:prop")))?;

        // </D:sync-collection>
        writer.write_event(Event::End(BytesEnd::new("D:sync-collection")))?;

        let bytes = writer.into_inner().into_inner();
        String::from_utf8(bytes).map_err(|e| CardDavError::Xml(format!("UTF-8 error: {e}")))
    }
}

/// addressbook-query REPORT request builder, restricted to `ETag`
/// listing.
#[derive(Debug, Clone, Copy, Default)]
pub struct AddressbookQueryRequest;

impl AddressbookQueryRequest {
    /// Creates a new addressbook-query request.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Builds the XML body for the addressbook-query REPORT.
    ///
    /// # Errors
    ///
    /// Returns an error if XML building fails.
    pub fn build(self) -> Result<String, CardDavError> {
        let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);

        // <C:addressbook-query xmlns:D="DAV:" xmlns:C="urn:ietf:params:xml:ns:carddav">
        let mut root = BytesStart::new("C:addressbook-query");
        root.push_attribute(("xmlns:D", ns::DAV));
        root.push_attribute(("xmlns:C", ns::CARDDAV));
        writer.write_event(Event::Start(root))?;

        // <D:prop><D:getetag/></D:prop>
        writer.write_event(Event::Start(BytesStart::new("D:prop")))?;
        writer.write_event(Event::Start(BytesStart::new("D:getetag")))?;
        writer.write_event(Event::End(BytesEnd::new("D:getetag")))?;
        writer.write_event(Event::End(BytesEnd::new("D:prop")))?;

        // </C:addressbook-query>
        writer.write_event(Event::End(BytesEnd::new("C:addressbook-query")))?;

        let bytes = writer.into_inner().into_inner();
        String::from_utf8(bytes).map_err(|e| CardDavError::Xml(format!("UTF-8 error: {e}")))
    }
}

/// addressbook-multiget REPORT request builder.
#[derive(Debug)]
pub struct AddressbookMultigetRequest {
    hrefs: Vec<String>,
}

impl AddressbookMultigetRequest {
    /// Creates a new addressbook-multiget request.
    #[must_use]
    pub fn new() -> Self {
        Self { hrefs: Vec::new() }
    }

    /// Adds an href to the request.
    pub fn add_href(&mut self, href: String) -> &mut Self {
        self.hrefs.push(href);
        self
    }

    /// Builds the XML body for the addressbook-multiget REPORT.
    ///
    /// # Errors
    ///
    /// Returns an error if XML building fails.
    pub fn build(&self) -> Result<String, CardDavError> {
        let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);

        // <C:addressbook-multiget xmlns:D="DAV:" xmlns:C="urn:ietf:params:xml:ns:carddav">
        let mut root = BytesStart::new("C:addressbook-multiget");
        root.push_attribute(("xmlns:D", ns::DAV));
        root.push_attribute(("xmlns:C", ns::CARDDAV));
        writer.write_event(Event::Start(root))?;

        // <D:prop><D:getetag/><C:address-data/></D:prop>
        writer.write_event(Event::Start(BytesStart::new("D:prop")))?;
        writer.write_event(Event::Start(BytesStart::new("D:getetag")))?;
        writer.write_event(Event::End(BytesEnd::new("D:getetag")))?;
        writer.write_event(Event::Start(BytesStart::new("C:address-data")))?;
        writer.write_event(Event::End(BytesEnd::new("C:address-data")))?;
        writer.write_event(Event::End(BytesEnd::new("D:prop")))?;

        // <D:href> for each href
        for href in &self.hrefs {
            writer.write_event(Event::Start(BytesStart::new("D:href")))?;
            writer.write_event(Event::Text(BytesText::new(href.as_str())))?;
            writer.write_event(Event::End(BytesEnd::new("D:href")))?;
        }

        // </C:addressbook-multiget>
        writer.write_event(Event::End(BytesEnd::new("C:addressbook-multiget")))?;

        let bytes = writer.into_inner().into_inner();
        String::from_utf8(bytes).map_err(|e| CardDavError::Xml(format!("UTF-8 error: {e}")))
    }
}

impl Default for AddressbookMultigetRequest {
    fn default() -> Self {
        Self::new()
    }
}

/// Dispatches authenticated `CardDAV` requests. Stateless per call;
/// authentication was selected when the underlying client was built.
#[derive(Debug, Clone)]
pub struct RequestGenerator {
    http: Arc<HttpClient>,
}

impl RequestGenerator {
    /// Creates a generator over an HTTP client.
    #[must_use]
    pub fn new(http: Arc<HttpClient>) -> Self {
        Self { http }
    }

    /// PROPFIND Depth:0 for `current-user-principal` on the server URL
    /// itself.
    ///
    /// # Errors
    ///
    /// Returns an error when the request cannot be dispatched. Error
    /// statuses pass through for the discovery fallbacks.
    pub async fn current_user_information(
        &self,
        server_url: &str,
    ) -> Result<Response, CardDavError> {
        let mut propfind = PropFindRequest::new();
        propfind.add_property(Prop::CurrentUserPrincipal);
        let body = propfind.build()?;

        self.http
            .execute_raw(
                self.propfind(server_url)?
                    .header("Depth", "0")
                    .body(body),
            )
            .await
    }

    /// PROPFIND Depth:0 for `addressbook-home-set` on the principal
    /// path.
    ///
    /// # Errors
    ///
    /// Returns an error on dispatch failure or an error status.
    pub async fn addressbook_urls(
        &self,
        server_url: &str,
        principal_path: &str,
    ) -> Result<Response, CardDavError> {
        let mut propfind = PropFindRequest::new();
        propfind.add_property(Prop::AddressbookHomeSet);
        let body = propfind.build()?;

        let url = full_url(server_url, principal_path)?;
        self.http
            .execute(self.propfind(&url)?.header("Depth", "0").body(body))
            .await
    }

    /// PROPFIND Depth:1 on the home set for resourcetype, displayname,
    /// ctag and sync token.
    ///
    /// # Errors
    ///
    /// Returns an error on dispatch failure or an error status.
    pub async fn addressbooks_information(
        &self,
        server_url: &str,
        home_path: &str,
    ) -> Result<Response, CardDavError> {
        let mut propfind = PropFindRequest::new();
        propfind.add_property(Prop::ResourceType);
        propfind.add_property(Prop::DisplayName);
        propfind.add_property(Prop::GetCTag);
        propfind.add_property(Prop::SyncToken);
        let body = propfind.build()?;

        let url = full_url(server_url, home_path)?;
        self.http
            .execute(self.propfind(&url)?.header("Depth", "1").body(body))
            .await
    }

    /// REPORT sync-collection with the cached sync token.
    ///
    /// # Errors
    ///
    /// Returns an error when the request cannot be dispatched. Error
    /// statuses pass through: the server may legitimately have
    /// forgotten the token, which degrades to the full `ETag` listing.
    pub async fn sync_token_delta(
        &self,
        server_url: &str,
        addressbook_url: &str,
        sync_token: &str,
    ) -> Result<Response, CardDavError> {
        let body = SyncCollectionRequest::new(sync_token.to_string()).build()?;
        let url = full_url(server_url, addressbook_url)?;
        self.http
            .execute_raw(self.report(&url)?.header("Depth", "0").body(body))
            .await
    }

    /// REPORT addressbook-query returning the `ETag` of every resource.
    ///
    /// # Errors
    ///
    /// Returns an error on dispatch failure or an error status.
    pub async fn contact_etags(
        &self,
        server_url: &str,
        addressbook_url: &str,
    ) -> Result<Response, CardDavError> {
        let body = AddressbookQueryRequest::new().build()?;
        let url = full_url(server_url, addressbook_url)?;
        self.http
            .execute(self.report(&url)?.header("Depth", "1").body(body))
            .await
    }

    /// REPORT addressbook-multiget for the full payload of the named
    /// resources.
    ///
    /// # Errors
    ///
    /// Returns an error on dispatch failure or an error status.
    pub async fn contact_multiget(
        &self,
        server_url: &str,
        addressbook_url: &str,
        uris: &[String],
    ) -> Result<Response, CardDavError> {
        let mut multiget = AddressbookMultigetRequest::new();
        for uri in uris {
            multiget.add_href(uri.clone());
        }
        let body = multiget.build()?;

        let url = full_url(server_url, addressbook_url)?;
        self.http
            .execute(self.report(&url)?.header("Depth", "1").body(body))
            .await
    }

    /// PUT of a vCard. An empty `if_match_etag` permits creation only
    /// (`If-None-Match: *`); otherwise the stored `ETag` guards the
    /// update.
    ///
    /// # Errors
    ///
    /// Returns an error when the request cannot be dispatched. Error
    /// statuses pass through so a read-only collection (405) can be
    /// swallowed.
    pub async fn upsync_add_mod(
        &self,
        server_url: &str,
        uri: &str,
        if_match_etag: &str,
        vcard: &str,
    ) -> Result<Response, CardDavError> {
        let url = full_url(server_url, uri)?;
        let mut req = self
            .http
            .build_request(Method::PUT, &url)
            .header("Content-Type", "text/vcard; charset=utf-8")
            .body(vcard.to_string());
        req = if if_match_etag.is_empty() {
            HttpClient::if_none_match_any(req)
        } else {
            HttpClient::if_match(req, if_match_etag)
        };
        self.http.execute_raw(req).await
    }

    /// DELETE with `If-Match` concurrency control.
    ///
    /// # Errors
    ///
    /// Returns an error when the request cannot be dispatched. Error
    /// statuses pass through for the read-only-collection case.
    pub async fn upsync_deletion(
        &self,
        server_url: &str,
        uri: &str,
        etag: &str,
    ) -> Result<Response, CardDavError> {
        let url = full_url(server_url, uri)?;
        let mut req = self.http.build_request(Method::DELETE, &url);
        if !etag.is_empty() {
            req = HttpClient::if_match(req, etag);
        }
        self.http.execute_raw(req).await
    }

    fn propfind(&self, url: &str) -> Result<reqwest::RequestBuilder, CardDavError> {
        let method = Method::from_bytes(b"PROPFIND")
            .map_err(|e| CardDavError::Transport(format!("invalid method: {e}")))?;
        Ok(self
            .http
            .build_request(method, url)
            .header("Content-Type", "application/xml; charset=utf-8"))
    }

    fn report(&self, url: &str) -> Result<reqwest::RequestBuilder, CardDavError> {
        let method = Method::from_bytes(b"REPORT")
            .map_err(|e| CardDavError::Transport(format!("invalid method: {e}")))?;
        Ok(self
            .http
            .build_request(method, url)
            .header("Content-Type", "application/xml; charset=utf-8"))
    }
}

/// Joins the server origin with a stored (percent-decoded) path.
fn full_url(server_url: &str, path: &str) -> Result<String, CardDavError> {
    if path.is_empty() {
        return Ok(server_url.to_string());
    }
    let base = Url::parse(server_url)
        .map_err(|e| CardDavError::Config(format!("invalid server URL {server_url:?}: {e}")))?;
    let host = base
        .host_str()
        .ok_or_else(|| CardDavError::Config(format!("server URL {server_url:?} has no host")))?;
    let origin = match base.port() {
        Some(port) => format!("{}://{host}:{port}", base.scheme()),
        None => format!("{}://{host}", base.scheme()),
    };
    let encoded = utf8_percent_encode(path, PATH_ENCODE);
    Ok(format!("{origin}{encoded}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_url_joins_origin_and_path() {
        let url = full_url("https://dav.example.org/ignored", "/ab/alice.vcf").expect("url");
        assert_eq!(url, "https://dav.example.org/ab/alice.vcf");
    }

    #[test]
    fn full_url_keeps_port_and_encodes() {
        let url = full_url("http://localhost:8080", "/ab/with space.vcf").expect("url");
        assert_eq!(url, "http://localhost:8080/ab/with%20space.vcf");
    }

    #[test]
    fn full_url_empty_path_uses_server_url() {
        let url = full_url("https://dav.example.org/root", "").expect("url");
        assert_eq!(url, "https://dav.example.org/root");
    }
}
