// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! The discovery and delta state machine.
//!
//! One sync run walks: principal discovery (with the RFC 6764
//! well-known and root fallbacks), address-book enumeration, a per-book
//! delta strategy (WebDAV-Sync token, CTag comparison or full `ETag`
//! listing), a multiget fetch of changed vCards, application to the
//! sync state, and finally the upload of local changes.

use std::collections::HashMap;
use std::sync::Arc;

use abook_core::{Contact, LocalChanges, RemoteChanges};
use log::{debug, trace, warn};
use reqwest::{Response, StatusCode};
use url::Url;

use crate::config::CardDavConfig;
use crate::error::CardDavError;
use crate::http::HttpClient;
use crate::request::RequestGenerator;
use crate::response::{
    PrincipalResponse, parse_addressbook_home, parse_addressbook_information, parse_contact_data,
    parse_contact_metadata, parse_sync_token_delta, parse_user_principal,
};
use crate::state::{SyncState, addressbook_specific_guid, format_guid, legacy_guid};
use crate::types::{AddressBookInfo, ContactInfo, FullContactInformation, ModificationKind};

/// Where discovery currently stands; governs which fallbacks are still
/// permitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DiscoveryStage {
    /// First request against the user-supplied URL.
    Started,
    /// Retrying against `/.well-known/carddav`.
    TryWellKnown,
    /// Last resort: retrying against the root path.
    TryRoot,
    /// A well-known redirect moved the base URL.
    Redirected,
}

/// The `CardDAV` sync engine.
///
/// Owns its converter, request generator and parser; borrows the
/// persistent sync state exclusively for the duration of one run.
#[derive(Debug)]
pub struct CardDavEngine<'a> {
    config: CardDavConfig,
    request: RequestGenerator,
    state: &'a mut SyncState,
    server_url: String,
    discovery_stage: DiscoveryStage,
    tried_addressbook_path_as_home_set: bool,
    default_addressbook: Option<String>,
    downsync_requests: u32,
    upsync_requests: u32,
    /// UID → (addressbook, contact) for everything downsynced this
    /// run; consulted by the spurious-modification filter.
    server_add_mods_by_uid: HashMap<String, Vec<(String, Contact)>>,
}

impl<'a> CardDavEngine<'a> {
    /// Creates an engine for one sync run.
    ///
    /// # Errors
    ///
    /// Returns an error if HTTP client initialization fails.
    pub fn new(config: CardDavConfig, state: &'a mut SyncState) -> Result<Self, CardDavError> {
        let http = Arc::new(HttpClient::new(&config)?);
        let server_url = config.server_url.clone();
        Ok(Self {
            config,
            request: RequestGenerator::new(http),
            state,
            server_url,
            discovery_stage: DiscoveryStage::Started,
            tried_addressbook_path_as_home_set: false,
            default_addressbook: None,
            downsync_requests: 0,
            upsync_requests: 0,
            server_add_mods_by_uid: HashMap::new(),
        })
    }

    /// The address book that receives locally-originated additions:
    /// the first one with delta activity this run, or the first
    /// enumerated.
    #[must_use]
    pub fn default_addressbook(&self) -> Option<&str> {
        self.default_addressbook.as_deref()
    }

    /// The base server URL, as possibly rewritten by a well-known
    /// redirect during discovery.
    #[must_use]
    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    /// Finds the address book a locally known guid belongs to.
    #[must_use]
    pub fn addressbook_for_guid(&self, guid: &str) -> Option<String> {
        for (addressbook, guids) in &self.state.addressbook_contact_guids {
            if guids.iter().any(|g| g == guid) {
                return Some(addressbook.clone());
            }
        }
        // legacy or device-side guid forms match after qualification
        if !guid.starts_with(&format!("{}:AB:", self.config.account_id)) {
            for (addressbook, guids) in &self.state.addressbook_contact_guids {
                let candidate =
                    addressbook_specific_guid(guid, self.config.account_id, addressbook);
                if guids.iter().any(|g| g == &candidate) {
                    return Some(addressbook.clone());
                }
            }
        }
        None
    }

    /// Runs discovery only and returns the deduplicated address-book
    /// paths (listing-only mode).
    ///
    /// # Errors
    ///
    /// Returns an error on any fatal discovery failure.
    pub async fn list_addressbooks(&mut self) -> Result<Vec<String>, CardDavError> {
        let infos = self.discover_addressbooks().await?;
        let mut paths = Vec::new();
        for info in infos {
            if !paths.contains(&info.url) {
                paths.push(info.url);
            }
        }
        Ok(paths)
    }

    /// Runs the complete downsync: discovery, per-address-book delta,
    /// contact fetch and state application. Returns the coalesced
    /// remote A/M/R across all address books.
    ///
    /// # Errors
    ///
    /// Returns an error on any fatal failure; recoverable conditions
    /// (well-known fallbacks, forgotten sync tokens) are handled
    /// internally.
    pub async fn fetch_remote_changes(&mut self) -> Result<RemoteChanges, CardDavError> {
        let infos = self.discover_addressbooks().await?;

        let mut changes = RemoteChanges::default();
        for info in &infos {
            self.downsync_addressbook(info, &mut changes).await?;
        }
        if self.default_addressbook.is_none() {
            self.default_addressbook = infos.first().map(|info| info.url.clone());
        }

        debug!(
            "downsync complete with total AMR: {}, {}, {}",
            changes.additions.len(),
            changes.modifications.len(),
            changes.removals.len()
        );
        Ok(changes)
    }

    // ---- discovery -----------------------------------------------------

    async fn discover_addressbooks(&mut self) -> Result<Vec<AddressBookInfo>, CardDavError> {
        let configured_path = self
            .config
            .addressbook_path
            .clone()
            .filter(|path| !path.is_empty());

        if let Some(path) = configured_path {
            // skip straight to the enumeration step with the given path
            let infos = self.fetch_addressbooks_information(&path).await?;
            if !infos.is_empty() {
                return Ok(infos);
            }
            if self.tried_addressbook_path_as_home_set {
                return Err(CardDavError::InvalidResponse(
                    "no address books found at the configured path".to_string(),
                ));
            }
            // the configured path may be the home set url instead
            debug!("given path is not an addressbook path; trying as home set url");
            self.tried_addressbook_path_as_home_set = true;
            let home = self.fetch_addressbook_home(&path).await?;
            if home.is_empty() {
                return Err(CardDavError::InvalidResponse(
                    "unable to parse addressbook home from response".to_string(),
                ));
            }
            let infos = self.fetch_addressbooks_information(&home).await?;
            if infos.is_empty() {
                return Err(CardDavError::InvalidResponse(
                    "unable to parse addressbook info from response".to_string(),
                ));
            }
            return Ok(infos);
        }

        match self.fetch_user_information().await? {
            // some servers answer the principal PROPFIND with
            // addressbook information; skip the home-set step
            PrincipalResponse::Addressbooks(infos) => Ok(infos),
            PrincipalResponse::Principal(principal) => {
                let home = self.fetch_addressbook_home(&principal).await?;
                if home.is_empty() {
                    return Err(CardDavError::InvalidResponse(
                        "unable to parse addressbook home from response".to_string(),
                    ));
                }
                let infos = self.fetch_addressbooks_information(&home).await?;
                if infos.is_empty() {
                    return Err(CardDavError::InvalidResponse(
                        "unable to parse addressbook info from response".to_string(),
                    ));
                }
                Ok(infos)
            }
        }
    }

    /// PROPFIND for the current user principal, with the RFC 6764
    /// well-known and root fallbacks and single-redirect adoption.
    async fn fetch_user_information(&mut self) -> Result<PrincipalResponse, CardDavError> {
        // an empty or root context path bootstraps via the well-known URI
        let initial = Url::parse(&self.server_url)
            .map_err(|e| CardDavError::Config(format!("invalid server URL: {e}")))?;
        if initial.path().is_empty() || initial.path() == "/" {
            self.server_url = well_known_url(&initial);
            self.discovery_stage = DiscoveryStage::TryWellKnown;
        }

        loop {
            debug!("requesting principal urls for user at {}", self.server_url);
            let response = self
                .request
                .current_user_information(&self.server_url)
                .await?;
            let status = response.status();

            if status.is_redirection() {
                self.handle_discovery_redirect(&response)?;
                continue;
            }

            if (status == StatusCode::NOT_FOUND || status == StatusCode::METHOD_NOT_ALLOWED)
                && matches!(
                    self.discovery_stage,
                    DiscoveryStage::Started | DiscoveryStage::TryWellKnown
                )
            {
                let current = Url::parse(&self.server_url)
                    .map_err(|e| CardDavError::Config(format!("invalid server URL: {e}")))?;
                if current.path().ends_with(".well-known/carddav") {
                    // RFC 6764: clients may repeat the request on the root URI
                    debug!("got HTTP {status} from well-known request; trying root URI");
                    self.server_url = root_url(&current);
                    self.discovery_stage = DiscoveryStage::TryRoot;
                } else {
                    // RFC 6764: repeat the bootstrap on the well-known URI
                    debug!("got HTTP {status} from initial discovery request; trying well-known URI");
                    self.server_url = well_known_url(&current);
                    self.discovery_stage = DiscoveryStage::TryWellKnown;
                }
                continue;
            }

            if !HttpClient::is_success(status) {
                let message = response.text().await.unwrap_or_default();
                trace!("discovery error body: {message}");
                return Err(CardDavError::Http {
                    status: status.as_u16(),
                    message,
                });
            }

            let body = response.text().await.map_err(CardDavError::from)?;
            trace!("principal response body: {body}");
            return match parse_user_principal(&body)? {
                PrincipalResponse::Principal(principal) if principal.is_empty() => {
                    Err(CardDavError::InvalidResponse(
                        "unable to parse user principal from response".to_string(),
                    ))
                }
                other => Ok(other),
            };
        }
    }

    /// Applies a discovery redirect, accepting only a cross-path
    /// redirect from the well-known URI.
    fn handle_discovery_redirect(&mut self, response: &Response) -> Result<(), CardDavError> {
        let location = response
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                CardDavError::Redirect("redirect without a Location header".to_string())
            })?;

        let origin = Url::parse(&self.server_url)
            .map_err(|e| CardDavError::Config(format!("invalid server URL: {e}")))?;
        let target = origin.join(location).map_err(|e| {
            CardDavError::Redirect(format!("invalid redirect target {location:?}: {e}"))
        })?;

        if target.path() == origin.path() {
            warn!("redirect specified is circular: {target}");
            return Err(CardDavError::Redirect(format!(
                "circular redirect to {target}"
            )));
        }
        if !origin.path().ends_with(".well-known/carddav") {
            // possibly malicious; abort rather than follow
            warn!("unexpected redirect from {origin} to {target}");
            return Err(CardDavError::Redirect(format!(
                "unsafe redirect from {origin} to {target}"
            )));
        }

        debug!("redirecting from {origin} to {target}");
        self.server_url = format!(
            "{}://{}{}",
            target.scheme(),
            host_with_port(&target),
            target.path()
        );
        self.discovery_stage = DiscoveryStage::Redirected;
        Ok(())
    }

    async fn fetch_addressbook_home(&mut self, principal: &str) -> Result<String, CardDavError> {
        debug!("requesting addressbook urls for user");
        let response = self
            .request
            .addressbook_urls(&self.server_url, principal)
            .await?;
        let body = response.text().await.map_err(CardDavError::from)?;
        trace!("addressbook home response body: {body}");
        parse_addressbook_home(&body)
    }

    async fn fetch_addressbooks_information(
        &mut self,
        home_path: &str,
    ) -> Result<Vec<AddressBookInfo>, CardDavError> {
        debug!("requesting addressbook sync information");
        let response = self
            .request
            .addressbooks_information(&self.server_url, home_path)
            .await?;
        let body = response.text().await.map_err(CardDavError::from)?;
        trace!("addressbook information response body: {body}");

        // a user-provided path is not used for cycle detection
        let cycle_context = if self.config.addressbook_path.as_deref() == Some(home_path) {
            None
        } else {
            Some(home_path)
        };
        parse_addressbook_information(&body, cycle_context)
    }

    // ---- per-addressbook delta -----------------------------------------

    async fn downsync_addressbook(
        &mut self,
        info: &AddressBookInfo,
        changes: &mut RemoteChanges,
    ) -> Result<(), CardDavError> {
        let url = info.url.as_str();
        let sync_token = info.sync_token.clone().filter(|t| !t.is_empty());
        let ctag = info.ctag.clone().filter(|c| !c.is_empty());

        let delta = match (sync_token, ctag) {
            (None, None) => {
                // neither marker available; the delta must be computed
                // manually on every run
                debug!("no sync-token or ctag given for addressbook {url}, manual delta detection required");
                self.state.addressbook_ctags.remove(url);
                Some(self.fetch_contact_metadata(url).await?)
            }
            (None, Some(ctag)) => match self.state.addressbook_ctags.get(url).cloned() {
                None => {
                    // first time sync: the full listing is the delta
                    self.state.addressbook_ctags.insert(url.to_string(), ctag);
                    Some(self.fetch_contact_metadata(url).await?)
                }
                Some(existing) if existing != ctag => {
                    self.state.addressbook_ctags.insert(url.to_string(), ctag);
                    Some(self.fetch_contact_metadata(url).await?)
                }
                Some(_) => {
                    debug!(
                        "no changes since last sync for {url} from account {}",
                        self.config.account_id
                    );
                    None
                }
            },
            (Some(token), ctag) => {
                // store the ctag anyway in case the server has
                // forgotten the sync token we cached from last time
                if let Some(ctag) = ctag {
                    self.state.addressbook_ctags.insert(url.to_string(), ctag);
                }
                match self.state.addressbook_sync_tokens.get(url).cloned() {
                    None => {
                        // first time sync, perform the slow full report
                        self.state
                            .addressbook_sync_tokens
                            .insert(url.to_string(), token);
                        Some(self.fetch_contact_metadata(url).await?)
                    }
                    Some(existing) if existing != token => {
                        self.state
                            .addressbook_sync_tokens
                            .insert(url.to_string(), token);
                        Some(self.fetch_immediate_delta(url, &existing).await?)
                    }
                    Some(_) => {
                        debug!(
                            "no changes since last sync for {url} from account {}",
                            self.config.account_id
                        );
                        None
                    }
                }
            }
        };

        let Some(delta) = delta else {
            return Ok(());
        };
        if self.default_addressbook.is_none() {
            self.default_addressbook = Some(url.to_string());
        }
        self.fetch_contacts(url, delta, changes).await
    }

    /// REPORT sync-collection against the cached token. A server that
    /// has forgotten the token degrades to the full `ETag` listing.
    async fn fetch_immediate_delta(
        &mut self,
        url: &str,
        sync_token: &str,
    ) -> Result<Vec<ContactInfo>, CardDavError> {
        debug!("requesting immediate delta for addressbook {url} with sync token {sync_token}");
        self.downsync_requests += 1;
        let response = self
            .request
            .sync_token_delta(&self.server_url, url, sync_token)
            .await;
        self.downsync_requests -= 1;
        let response = response?;

        if !HttpClient::is_success(response.status()) {
            warn!(
                "sync-collection REPORT failed with {} for {url}, falling back to full etag listing",
                response.status()
            );
            return self.fetch_contact_metadata(url).await;
        }

        let body = response.text().await.map_err(CardDavError::from)?;
        trace!("sync delta response body: {body}");
        let known_uris = self.known_uris(url);
        let (infos, new_token) = parse_sync_token_delta(&body, &known_uris)?;
        if let Some(token) = new_token {
            self.state
                .addressbook_sync_tokens
                .insert(url.to_string(), token);
        }
        Ok(infos)
    }

    /// REPORT addressbook-query for every `ETag`, diffed against the
    /// stored state.
    async fn fetch_contact_metadata(&mut self, url: &str) -> Result<Vec<ContactInfo>, CardDavError> {
        debug!("requesting contact metadata for addressbook {url}");
        self.downsync_requests += 1;
        let response = self.request.contact_etags(&self.server_url, url).await;
        self.downsync_requests -= 1;
        let response = response?;

        let body = response.text().await.map_err(CardDavError::from)?;
        trace!("contact metadata response body: {body}");
        let known_guids = self.known_uris(url);
        let known_etags: HashMap<String, String> = known_guids
            .iter()
            .map(|(uri, guid)| {
                (
                    uri.clone(),
                    self.state.contact_etags.get(guid).cloned().unwrap_or_default(),
                )
            })
            .collect();
        parse_contact_metadata(&body, url, &known_etags, &known_guids)
    }

    /// The stored path → guid map of one address book.
    fn known_uris(&self, addressbook_url: &str) -> HashMap<String, String> {
        let mut map = HashMap::new();
        if let Some(guids) = self.state.addressbook_contact_guids.get(addressbook_url) {
            for guid in guids {
                if let Some(uri) = self.state.contact_uris.get(guid) {
                    map.insert(uri.clone(), guid.clone());
                }
            }
        }
        map
    }

    // ---- contact fetch and apply ---------------------------------------

    async fn fetch_contacts(
        &mut self,
        url: &str,
        delta: Vec<ContactInfo>,
        changes: &mut RemoteChanges,
    ) -> Result<(), CardDavError> {
        let mut additions: HashMap<String, ContactInfo> = HashMap::new();
        let mut modifications: HashMap<String, ContactInfo> = HashMap::new();
        let mut deletions: Vec<ContactInfo> = Vec::new();
        let mut fetch_uris: Vec<String> = Vec::new();
        for info in delta {
            match info.kind {
                ModificationKind::Addition => {
                    fetch_uris.push(info.uri.clone());
                    additions.insert(info.uri.clone(), info);
                }
                ModificationKind::Modification => {
                    fetch_uris.push(info.uri.clone());
                    modifications.insert(info.uri.clone(), info);
                }
                ModificationKind::Deletion => deletions.push(info),
            }
        }

        debug!(
            "have calculated AMR: {} {} {} for addressbook {url}",
            additions.len(),
            modifications.len(),
            deletions.len()
        );

        if fetch_uris.is_empty() {
            debug!("no further data to fetch for {url}");
        } else {
            debug!("fetching vcard data for {} contacts", fetch_uris.len());
            self.downsync_requests += 1;
            let response = self
                .request
                .contact_multiget(&self.server_url, url, &fetch_uris)
                .await;
            self.downsync_requests -= 1;
            let response = response?;

            let body = response.text().await.map_err(CardDavError::from)?;
            trace!("multiget response body: {body}");
            let add_mods = parse_contact_data(&body, url, self.config.account_id)?;
            for (uri, full) in add_mods {
                if additions.contains_key(&uri) {
                    self.apply_remote_addition(url, &uri, full, changes);
                } else if modifications.contains_key(&uri) {
                    self.apply_remote_modification(url, full, changes);
                } else {
                    warn!("ignoring unknown addition/modification: {uri}");
                }
            }
        }

        self.apply_remote_deletions(url, deletions, changes);
        Ok(())
    }

    fn apply_remote_addition(
        &mut self,
        url: &str,
        uri: &str,
        full: FullContactInformation,
        changes: &mut RemoteChanges,
    ) {
        let mut contact = full.contact;
        let guid = contact.guid_str().to_string();

        self.state.contact_etags.insert(guid.clone(), full.etag);
        self.state.contact_uris.insert(guid.clone(), uri.to_string());
        self.state.contact_uids.insert(guid.clone(), full.uid.clone());
        self.state
            .contact_unsupported_properties
            .insert(guid.clone(), full.unsupported_properties);
        let guids = self
            .state
            .addressbook_contact_guids
            .entry(url.to_string())
            .or_default();
        if !guids.iter().any(|g| g == &guid) {
            guids.push(guid.clone());
        }

        // a server-side addition may be a previously-upsynced local
        // addition being reported back; reattach the local id so the
        // store updates rather than duplicates
        if let Some(id) = self.state.contact_ids.get(&guid) {
            contact.id = Some(id.clone());
        }

        self.server_add_mods_by_uid
            .entry(full.uid)
            .or_default()
            .push((url.to_string(), contact.clone()));
        changes.additions.push(contact);
    }

    fn apply_remote_modification(
        &mut self,
        url: &str,
        full: FullContactInformation,
        changes: &mut RemoteChanges,
    ) {
        let mut contact = full.contact;
        let guid = contact.guid_str().to_string();

        self.state
            .contact_unsupported_properties
            .insert(guid.clone(), full.unsupported_properties);
        self.state.contact_etags.insert(guid.clone(), full.etag);

        match self.state.contact_ids.get(&guid) {
            Some(id) => contact.id = Some(id.clone()),
            None => warn!("modified contact has no local id: {guid}"),
        }

        self.server_add_mods_by_uid
            .entry(full.uid)
            .or_default()
            .push((url.to_string(), contact.clone()));
        changes.modifications.push(contact);
    }

    fn apply_remote_deletions(
        &mut self,
        url: &str,
        deletions: Vec<ContactInfo>,
        changes: &mut RemoteChanges,
    ) {
        for info in deletions {
            let Some(mut guid) = info.guid else {
                warn!("removed contact has no local state: {}", info.uri);
                continue;
            };

            if !self.state.contact_ids.contains_key(&guid) {
                // an entry recorded before addressbook-scoped guids may
                // still carry the old form
                let prefix = format!("{}:AB:{url}:", self.config.account_id);
                if let Some(uid) = guid.strip_prefix(&prefix) {
                    guid = legacy_guid(self.config.account_id, uid);
                }
            }

            let Some(id) = self.state.contact_ids.get(&guid).cloned() else {
                // cannot remove it if we don't know the id
                warn!("removed contact has no local id: {guid}");
                continue;
            };

            let mut doomed = Contact::default();
            doomed.set_guid(guid.clone());
            doomed.id = Some(id);
            changes.removals.push(doomed);

            self.state.forget_contact(&guid, url);
        }
    }

    // ---- upsync --------------------------------------------------------

    /// Uploads one address book's local A/M/R.
    ///
    /// `significant` decides whether a local modification differs
    /// meaningfully from a contact downsynced this run with the same
    /// UID; echoes of a downsync are skipped without a PUT.
    ///
    /// # Errors
    ///
    /// Returns an error on any fatal upload failure. A 405 from a
    /// read-only collection is logged and swallowed.
    pub async fn upsync(
        &mut self,
        addressbook_url: &str,
        changes: &LocalChanges,
        significant: &dyn Fn(&Contact, &Contact) -> bool,
    ) -> Result<(), CardDavError> {
        debug!(
            "upsyncing updates to addressbook {addressbook_url}: {} {} {}",
            changes.additions.len(),
            changes.modifications.len(),
            changes.removals.len()
        );

        let mut spurious_modifications = 0usize;

        // put local additions
        for contact in &changes.additions {
            let mut c = contact.clone();
            // generate a server-side uid and a valid resource path
            let uid = uuid::Uuid::new_v4().simple().to_string();
            let guid = format_guid(self.config.account_id, addressbook_url, &uid);
            let uri = format!("{}/{uid}.vcf", addressbook_url.trim_end_matches('/'));

            // record state immediately so later operations in this run
            // can already see the contact
            self.state.contact_uids.insert(guid.clone(), uid.clone());
            self.state.contact_uris.insert(guid.clone(), uri.clone());
            if let Some(id) = &c.id {
                self.state.contact_ids.insert(guid.clone(), id.clone());
            }

            // the vCard UID line must carry the raw uid, not the guid
            c.set_guid(uid);
            let vcard = abook_vcard::export_vcard(&c, &[]);
            trace!("generated vcard: {vcard}");

            self.upsync_requests += 1;
            let response = self
                .request
                .upsync_add_mod(&self.server_url, &uri, "", &vcard)
                .await?;
            self.handle_upsync_response(response, Some(guid.as_str())).await?;
        }

        // put local modifications
        for contact in &changes.modifications {
            let mut c = contact.clone();
            let old_guid = c.guid_str().to_string();
            if old_guid.is_empty() {
                warn!("modified contact has no guid: {:?}", c.id);
                continue;
            }
            let guid =
                addressbook_specific_guid(&old_guid, self.config.account_id, addressbook_url);
            let uid = match self.state.contact_uids.get(&guid).cloned() {
                Some(uid) => uid,
                None if self.state.contact_uids.contains_key(&old_guid) => {
                    // entry still keyed by the pre-addressbook guid form
                    self.state.migrate_guid(&old_guid, &guid, addressbook_url);
                    self.state.contact_uids.get(&guid).cloned().unwrap_or_default()
                }
                None => {
                    warn!("modified contact server uid unknown: {guid}");
                    continue;
                }
            };

            c.set_guid(uid.clone());

            // a modification may be a local echo of a downsync applied
            // to the same contact, possibly in a different addressbook
            if let Some(downsynced) = self.server_add_mods_by_uid.get(&uid) {
                let spurious = downsynced
                    .iter()
                    .all(|(_, downsynced_contact)| !significant(&c, downsynced_contact));
                if spurious {
                    debug!("not upsyncing spurious change to contact: {guid}");
                    spurious_modifications += 1;
                    continue;
                }
            }

            let unsupported = self
                .state
                .contact_unsupported_properties
                .get(&guid)
                .cloned()
                .unwrap_or_default();
            let vcard = abook_vcard::export_vcard(&c, &unsupported);
            trace!("generated vcard: {vcard}");
            let uri = self.state.contact_uris.get(&guid).cloned().unwrap_or_default();
            let etag = self.state.contact_etags.get(&guid).cloned().unwrap_or_default();

            self.upsync_requests += 1;
            let response = self
                .request
                .upsync_add_mod(&self.server_url, &uri, &etag, &vcard)
                .await?;
            self.handle_upsync_response(response, Some(guid.as_str())).await?;
        }

        // delete local removals
        for contact in &changes.removals {
            let old_guid = contact.guid_str().to_string();
            let guid =
                addressbook_specific_guid(&old_guid, self.config.account_id, addressbook_url);
            if !self.state.contact_uris.contains_key(&guid) {
                if self.state.contact_uris.contains_key(&old_guid) {
                    self.state.migrate_guid(&old_guid, &guid, addressbook_url);
                } else {
                    warn!("deleted contact server uri unknown: {guid}");
                    continue;
                }
            }
            let uri = self.state.contact_uris.get(&guid).cloned().unwrap_or_default();
            let etag = self.state.contact_etags.get(&guid).cloned().unwrap_or_default();

            self.upsync_requests += 1;
            let response = self
                .request
                .upsync_deletion(&self.server_url, &uri, &etag)
                .await?;
            self.handle_upsync_response(response, None).await?;

            self.state.forget_contact(&guid, addressbook_url);
        }

        debug!("ignored {spurious_modifications} spurious updates to addressbook {addressbook_url}");
        Ok(())
    }

    /// Common handling of a PUT/DELETE response: swallow a read-only
    /// 405, refresh the stored `ETag` when one is reported.
    async fn handle_upsync_response(
        &mut self,
        response: Response,
        guid: Option<&str>,
    ) -> Result<(), CardDavError> {
        self.upsync_requests -= 1;
        if self.upsync_requests == 0 {
            trace!("no upsync requests outstanding");
        }

        let status = response.status();
        if !HttpClient::is_success(status) {
            if status == StatusCode::METHOD_NOT_ALLOWED {
                // most likely the server restricted writes to the
                // collection; the sync must not abort on this
                warn!("405 MethodNotAllowed - is the collection read-only?");
                warn!("continuing sync despite this error - upsync will have failed!");
                return Ok(());
            }
            let message = response.text().await.unwrap_or_default();
            trace!("upsync error body: {message}");
            return Err(CardDavError::Http {
                status: status.as_u16(),
                message,
            });
        }

        if let Some(guid) = guid {
            match HttpClient::extract_etag(&response) {
                Some(etag) => {
                    debug!("got updated etag for {guid}: {etag}");
                    self.state.contact_etags.insert(guid.to_string(), etag);
                }
                None => {
                    // the server-side etag now differs from the stored
                    // one; the next sync will classify the resulting
                    // remote modification as spurious by inspection
                    warn!(
                        "no updated etag provided for {guid}: will be reported as spurious remote modification next sync"
                    );
                }
            }
        }
        Ok(())
    }
}

fn host_with_port(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    }
}

fn well_known_url(url: &Url) -> String {
    format!("{}://{}/.well-known/carddav", url.scheme(), host_with_port(url))
}

fn root_url(url: &Url) -> String {
    format!("{}://{}/", url.scheme(), host_with_port(url))
}
