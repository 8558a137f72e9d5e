// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Multistatus response parsing for `CardDAV` operations.
//!
//! The typed parse functions are pure: XML plus a small context in,
//! typed structures out. Empty results are legal and signal the
//! higher-level retries; only malformed XML is an error.

use std::collections::HashMap;

use log::{debug, warn};
use percent_encoding::percent_decode_str;
use quick_xml::events::Event;
use url::Url;

use crate::error::CardDavError;
use crate::state::format_guid;
use crate::types::{AddressBookInfo, ContactInfo, FullContactInformation, ModificationKind};

/// `WebDAV` multistatus response.
#[derive(Debug, Clone)]
pub struct MultiStatusResponse {
    /// The response items.
    pub responses: Vec<ResponseItem>,
    /// The multistatus-level sync token of a sync-collection REPORT.
    pub sync_token: Option<String>,
}

/// Individual response in multistatus.
#[derive(Debug, Clone)]
pub struct ResponseItem {
    /// The resource href, verbatim.
    pub href: String,
    /// Property results grouped by status.
    pub prop_stats: Vec<PropStat>,
    /// Response-level status (sync-collection deletions carry one).
    pub status: Option<String>,
}

/// Property stat with status and value.
#[derive(Debug, Clone)]
pub struct PropStat {
    /// The property values.
    pub props: Properties,
    /// The status line for this group.
    pub status: String,
}

/// WebDAV/CardDAV properties.
#[derive(Debug, Clone, Default)]
pub struct Properties {
    /// `displayname`.
    pub display_name: Option<String>,
    /// `getetag`.
    pub get_etag: Option<String>,
    /// `address-data` (the vCard payload).
    pub address_data: Option<String>,
    /// Inner href of `current-user-principal`.
    pub current_user_principal: Option<String>,
    /// Inner href of `addressbook-home-set`.
    pub addressbook_home_set: Option<String>,
    /// `getctag` (CalendarServer extension).
    pub getctag: Option<String>,
    /// `sync-token` property.
    pub sync_token: Option<String>,
    /// `resourcetype` contained `addressbook`.
    pub is_addressbook: bool,
    /// `resourcetype` contained `collection`.
    pub is_collection: bool,
}

impl MultiStatusResponse {
    /// Parses a multistatus response from XML.
    ///
    /// # Errors
    ///
    /// Returns an error if XML parsing fails.
    #[expect(clippy::too_many_lines)]
    pub fn from_xml(xml: &str) -> Result<Self, CardDavError> {
        let mut reader = quick_xml::Reader::from_str(xml);
        // Configure reader to trim text and check namespaces
        reader.config_mut().trim_text(true);
        reader.config_mut().check_end_names = true;

        let mut responses = Vec::new();
        let mut top_sync_token: Option<String> = None;
        let mut current_response: Option<ResponseItem> = None;
        let mut current_prop_stats: Vec<PropStat> = Vec::new();
        let mut current_props: Properties = Properties::default();
        let mut in_prop = false;
        let mut in_response = false;
        let mut in_propstat = false;

        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::End(ref e) if e.name().local_name().into_inner() == b"multistatus" => break,
                Event::Eof => break,

                Event::Start(ref e) => match e.name().local_name().into_inner() {
                    b"response" => {
                        in_response = true;
                        current_response = Some(ResponseItem {
                            href: String::new(),
                            prop_stats: Vec::new(),
                            status: None,
                        });
                    }
                    b"href" if in_response && !in_prop => {
                        if let Some(text) = read_text(&mut reader, &mut buf)? {
                            if let Some(ref mut resp) = current_response {
                                resp.href = text;
                            }
                        }
                    }
                    b"propstat" if in_response => {
                        in_propstat = true;
                        current_props = Properties::default();
                    }

                    b"prop" => in_prop = true,

                    b"displayname" if in_prop => {
                        current_props.display_name = read_text(&mut reader, &mut buf)?;
                    }
                    b"getetag" if in_prop => {
                        current_props.get_etag = read_text(&mut reader, &mut buf)?;
                    }
                    b"address-data" if in_prop => {
                        current_props.address_data = read_text(&mut reader, &mut buf)?;
                    }
                    b"getctag" if in_prop => {
                        current_props.getctag = read_text(&mut reader, &mut buf)?;
                    }
                    b"sync-token" if in_prop => {
                        current_props.sync_token = read_text(&mut reader, &mut buf)?;
                    }
                    b"sync-token" if !in_response => {
                        top_sync_token = read_text(&mut reader, &mut buf)?;
                    }
                    b"current-user-principal" if in_prop => {
                        current_props.current_user_principal =
                            read_inner_href(&mut reader, &mut buf, b"current-user-principal")?;
                    }
                    b"addressbook-home-set" if in_prop => {
                        current_props.addressbook_home_set =
                            read_inner_href(&mut reader, &mut buf, b"addressbook-home-set")?;
                    }
                    b"resourcetype" if in_prop => {
                        current_props.is_collection = true;
                        // Look for addressbook or collection
                        loop {
                            match reader.read_event_into(&mut buf)? {
                                Event::End(ref e)
                                    if e.name().local_name().into_inner() == b"resourcetype" =>
                                {
                                    break;
                                }
                                Event::Start(ref e) | Event::Empty(ref e) => {
                                    if e.name().local_name().into_inner() == b"addressbook" {
                                        current_props.is_addressbook = true;
                                    }
                                }
                                Event::Eof => {
                                    return Err(CardDavError::Xml("unexpected EOF".to_string()));
                                }
                                _ => {}
                            }
                        }
                    }
                    b"status" if in_propstat => {
                        if let Some(status) = read_text(&mut reader, &mut buf)? {
                            current_prop_stats.push(PropStat {
                                props: current_props.clone(),
                                status,
                            });
                        }
                    }
                    b"status" if in_response => {
                        if let Some(status) = read_text(&mut reader, &mut buf)? {
                            if let Some(ref mut resp) = current_response {
                                resp.status = Some(status);
                            }
                        }
                    }
                    _ => {}
                },
                Event::End(ref e) => match e.name().local_name().into_inner() {
                    b"response" if in_response => {
                        in_response = false;
                        if let Some(mut resp) = current_response.take() {
                            resp.prop_stats.clone_from(&current_prop_stats);
                            current_prop_stats.clear();
                            responses.push(resp);
                        }
                    }
                    b"propstat" if in_propstat => {
                        in_propstat = false;
                    }
                    b"prop" => {
                        in_prop = false;
                    }
                    _ => {}
                },
                _ => {}
            }
            buf.clear();
        }

        Ok(Self {
            responses,
            sync_token: top_sync_token,
        })
    }

    /// The first successful propstat of a response item.
    fn success_props(item: &ResponseItem) -> impl Iterator<Item = &Properties> {
        item.prop_stats
            .iter()
            .filter(|ps| ps.status.contains("200"))
            .map(|ps| &ps.props)
    }
}

/// Reads the text (or CDATA) content of the element just started.
fn read_text<R: std::io::BufRead>(
    reader: &mut quick_xml::Reader<R>,
    buf: &mut Vec<u8>,
) -> Result<Option<String>, CardDavError> {
    match reader.read_event_into(buf)? {
        Event::Text(text) => Ok(Some(
            text.decode()
                .map_err(|e| CardDavError::Xml(e.to_string()))?
                .to_string(),
        )),
        Event::CData(data) => Ok(Some(
            String::from_utf8(data.into_inner().into_owned())
                .map_err(|e| CardDavError::Xml(format!("UTF-8 error: {e}")))?,
        )),
        _ => Ok(None),
    }
}

/// Reads the `<D:href>` nested inside a wrapping property element.
fn read_inner_href<R: std::io::BufRead>(
    reader: &mut quick_xml::Reader<R>,
    buf: &mut Vec<u8>,
    end: &[u8],
) -> Result<Option<String>, CardDavError> {
    let mut href = None;
    loop {
        match reader.read_event_into(buf)? {
            Event::End(ref e) if e.name().local_name().into_inner() == end => break,
            Event::Start(ref e) if e.name().local_name().into_inner() == b"href" => {
                if let Event::Text(text) = reader.read_event_into(buf)? {
                    href = Some(
                        text.decode()
                            .map_err(|e| CardDavError::Xml(e.to_string()))?
                            .to_string(),
                    );
                }
            }
            Event::Eof => return Err(CardDavError::Xml("unexpected EOF".to_string())),
            _ => {}
        }
    }
    Ok(href)
}

/// Normalizes an href to path-only, percent-decoded form so stored and
/// reported paths compare equal regardless of how the server spells
/// them.
#[must_use]
pub fn normalize_href(href: &str) -> String {
    let path = if href.starts_with("http://") || href.starts_with("https://") {
        Url::parse(href).map_or_else(|_| href.to_string(), |u| u.path().to_string())
    } else {
        href.to_string()
    };
    percent_decode_str(&path).decode_utf8_lossy().to_string()
}

fn trim_trailing_slash(path: &str) -> &str {
    if path.len() > 1 {
        path.trim_end_matches('/')
    } else {
        path
    }
}

/// What a principal PROPFIND turned out to contain.
#[derive(Debug, Clone)]
pub enum PrincipalResponse {
    /// The expected `current-user-principal` path; empty when the
    /// response carried none.
    Principal(String),
    /// Some servers answer the principal PROPFIND with address-book
    /// information directly, allowing discovery to skip ahead.
    Addressbooks(Vec<AddressBookInfo>),
}

/// Parses the response of the `current-user-principal` PROPFIND.
///
/// # Errors
///
/// Returns an error if XML parsing fails.
pub fn parse_user_principal(xml: &str) -> Result<PrincipalResponse, CardDavError> {
    let multistatus = MultiStatusResponse::from_xml(xml)?;

    for item in &multistatus.responses {
        for props in MultiStatusResponse::success_props(item) {
            if let Some(principal) = &props.current_user_principal {
                return Ok(PrincipalResponse::Principal(normalize_href(principal)));
            }
        }
    }

    let infos = collect_addressbooks(&multistatus, None);
    if infos.is_empty() {
        Ok(PrincipalResponse::Principal(String::new()))
    } else {
        Ok(PrincipalResponse::Addressbooks(infos))
    }
}

/// Parses the `addressbook-home-set` path out of a principal PROPFIND
/// response. Empty when the server reported none.
///
/// # Errors
///
/// Returns an error if XML parsing fails.
pub fn parse_addressbook_home(xml: &str) -> Result<String, CardDavError> {
    let multistatus = MultiStatusResponse::from_xml(xml)?;
    for item in &multistatus.responses {
        for props in MultiStatusResponse::success_props(item) {
            if let Some(home) = &props.addressbook_home_set {
                return Ok(normalize_href(home));
            }
        }
    }
    Ok(String::new())
}

/// Parses the Depth:1 home-set enumeration into address-book metadata.
///
/// `home_path` is the queried path when it came out of discovery; a
/// response advertising the home itself as an address book is a cycle
/// and is ignored.
///
/// # Errors
///
/// Returns an error if XML parsing fails.
pub fn parse_addressbook_information(
    xml: &str,
    home_path: Option<&str>,
) -> Result<Vec<AddressBookInfo>, CardDavError> {
    let multistatus = MultiStatusResponse::from_xml(xml)?;
    Ok(collect_addressbooks(&multistatus, home_path))
}

fn collect_addressbooks(
    multistatus: &MultiStatusResponse,
    home_path: Option<&str>,
) -> Vec<AddressBookInfo> {
    let home = home_path.map(|p| {
        let normalized = normalize_href(p);
        trim_trailing_slash(&normalized).to_string()
    });

    let mut infos = Vec::new();
    for item in &multistatus.responses {
        let href = normalize_href(&item.href);
        let url = trim_trailing_slash(&href).to_string();
        if home.as_deref() == Some(url.as_str()) {
            debug!("ignoring self-referencing addressbook response for {url}");
            continue;
        }

        let mut info = AddressBookInfo {
            url,
            ..AddressBookInfo::default()
        };
        let mut is_addressbook = false;
        for props in MultiStatusResponse::success_props(item) {
            is_addressbook |= props.is_addressbook;
            if info.ctag.is_none() {
                info.ctag.clone_from(&props.getctag);
            }
            if info.sync_token.is_none() {
                info.sync_token.clone_from(&props.sync_token);
            }
            if info.display_name.is_none() {
                info.display_name.clone_from(&props.display_name);
            }
        }
        if is_addressbook {
            infos.push(info);
        }
    }
    infos
}

/// Parses a sync-collection REPORT response into delta entries plus the
/// new sync token.
///
/// `known_uris` maps the account's stored contact paths to their GUIDs;
/// membership decides between addition and modification, and fills the
/// GUID of deletions.
///
/// # Errors
///
/// Returns an error if XML parsing fails.
pub fn parse_sync_token_delta(
    xml: &str,
    known_uris: &HashMap<String, String>,
) -> Result<(Vec<ContactInfo>, Option<String>), CardDavError> {
    let multistatus = MultiStatusResponse::from_xml(xml)?;

    let mut infos = Vec::new();
    for item in &multistatus.responses {
        let uri = normalize_href(&item.href);

        let deleted = item
            .status
            .as_ref()
            .is_some_and(|status| status.contains("404"));
        if deleted {
            infos.push(ContactInfo {
                guid: known_uris.get(&uri).cloned(),
                uri,
                etag: String::new(),
                kind: ModificationKind::Deletion,
            });
            continue;
        }

        let Some(etag) = MultiStatusResponse::success_props(item)
            .find_map(|props| props.get_etag.clone())
        else {
            // collection-level entry, nothing to fetch
            continue;
        };
        let kind = if known_uris.contains_key(&uri) {
            ModificationKind::Modification
        } else {
            ModificationKind::Addition
        };
        infos.push(ContactInfo {
            guid: known_uris.get(&uri).cloned(),
            uri,
            etag,
            kind,
        });
    }

    Ok((infos, multistatus.sync_token))
}

/// Diffs a full `ETag` listing against the stored state to compute the
/// delta manually.
///
/// Paths present remotely but unknown locally are additions; known
/// paths with a changed `ETag` are modifications; known paths missing
/// from the listing are deletions.
///
/// # Errors
///
/// Returns an error if XML parsing fails.
pub fn parse_contact_metadata(
    xml: &str,
    addressbook_url: &str,
    known_etags: &HashMap<String, String>,
    known_guids: &HashMap<String, String>,
) -> Result<Vec<ContactInfo>, CardDavError> {
    let multistatus = MultiStatusResponse::from_xml(xml)?;
    let normalized_ab = normalize_href(addressbook_url);
    let ab = trim_trailing_slash(&normalized_ab);

    let mut listed: Vec<(String, String)> = Vec::new();
    for item in &multistatus.responses {
        let uri = normalize_href(&item.href);
        if trim_trailing_slash(&uri) == ab {
            continue;
        }
        if let Some(etag) =
            MultiStatusResponse::success_props(item).find_map(|props| props.get_etag.clone())
        {
            listed.push((uri, etag));
        }
    }

    let mut infos = Vec::new();
    for (uri, etag) in &listed {
        match known_etags.get(uri) {
            None => infos.push(ContactInfo {
                uri: uri.clone(),
                etag: etag.clone(),
                kind: ModificationKind::Addition,
                guid: known_guids.get(uri).cloned(),
            }),
            Some(stored) if stored != etag => infos.push(ContactInfo {
                uri: uri.clone(),
                etag: etag.clone(),
                kind: ModificationKind::Modification,
                guid: known_guids.get(uri).cloned(),
            }),
            Some(_) => {}
        }
    }
    for uri in known_etags.keys() {
        if !listed.iter().any(|(listed_uri, _)| listed_uri == uri) {
            infos.push(ContactInfo {
                uri: uri.clone(),
                etag: String::new(),
                kind: ModificationKind::Deletion,
                guid: known_guids.get(uri).cloned(),
            });
        }
    }

    Ok(infos)
}

/// Parses an addressbook-multiget response into full contact records
/// keyed by normalized path.
///
/// Each contact's guid detail is stamped with the addressbook-specific
/// GUID computed from its vCard UID. Resources without a UID cannot be
/// tracked and are skipped with a warning.
///
/// # Errors
///
/// Returns an error if XML parsing fails or a vCard cannot be
/// converted.
pub fn parse_contact_data(
    xml: &str,
    addressbook_url: &str,
    account_id: u32,
) -> Result<HashMap<String, FullContactInformation>, CardDavError> {
    let multistatus = MultiStatusResponse::from_xml(xml)?;

    let mut contacts = HashMap::new();
    for item in &multistatus.responses {
        let uri = normalize_href(&item.href);
        let Some(props) = MultiStatusResponse::success_props(item)
            .find(|props| props.address_data.is_some())
        else {
            continue;
        };
        let Some(vcard) = &props.address_data else {
            continue;
        };

        let (mut contact, unsupported_properties) = abook_vcard::import_vcard(vcard)?;
        let uid = contact.guid_str().to_string();
        if uid.is_empty() {
            warn!("imported contact has no UID, skipping {uri}");
            continue;
        }
        contact.set_guid(format_guid(account_id, addressbook_url, &uid));

        contacts.insert(
            uri.clone(),
            FullContactInformation {
                contact,
                unsupported_properties,
                etag: props.get_etag.clone().unwrap_or_default(),
                uid,
            },
        );
    }
    Ok(contacts)
}
