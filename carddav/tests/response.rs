// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Response parsing tests.

use std::collections::HashMap;

use abook_carddav::{
    ModificationKind, MultiStatusResponse, PrincipalResponse, normalize_href,
    parse_addressbook_home, parse_addressbook_information, parse_contact_data,
    parse_contact_metadata, parse_sync_token_delta, parse_user_principal,
};

#[test]
fn response_parse_multistatus_basic() {
    let xml = "\
<?xml version=\"1.0\" encoding=\"utf-8\" ?>
<D:multistatus xmlns:D=\"DAV:\">
  <D:response>
    <D:href>/ab/alice.vcf</D:href>
    <D:propstat>
      <D:prop>
        <D:getetag>\"12345\"</D:getetag>
      </D:prop>
      <D:status>HTTP/1.1 200 OK</D:status>
    </D:propstat>
  </D:response>
</D:multistatus>";

    let response = MultiStatusResponse::from_xml(xml).expect("Failed to parse multistatus");

    assert_eq!(response.responses.len(), 1);
    let item = response.responses.first().expect("response item");
    assert_eq!(item.href, "/ab/alice.vcf");
    assert_eq!(item.prop_stats.len(), 1);
    let prop_stat = item.prop_stats.first().expect("prop stat");
    assert_eq!(prop_stat.status, "HTTP/1.1 200 OK");
    assert_eq!(prop_stat.props.get_etag.as_deref(), Some("\"12345\""));
}

#[test]
fn response_parse_user_principal() {
    let xml = "\
<?xml version=\"1.0\" encoding=\"utf-8\" ?>
<D:multistatus xmlns:D=\"DAV:\">
  <D:response>
    <D:href>/</D:href>
    <D:propstat>
      <D:prop>
        <D:current-user-principal>
          <D:href>/principals/users/jane/</D:href>
        </D:current-user-principal>
      </D:prop>
      <D:status>HTTP/1.1 200 OK</D:status>
    </D:propstat>
  </D:response>
</D:multistatus>";

    let parsed = parse_user_principal(xml).expect("Failed to parse principal");
    match parsed {
        PrincipalResponse::Principal(path) => assert_eq!(path, "/principals/users/jane/"),
        PrincipalResponse::Addressbooks(_) => panic!("expected principal"),
    }
}

#[test]
fn response_principal_request_may_answer_with_addressbooks() {
    let xml = "\
<?xml version=\"1.0\" encoding=\"utf-8\" ?>
<D:multistatus xmlns:D=\"DAV:\" xmlns:C=\"urn:ietf:params:xml:ns:carddav\">
  <D:response>
    <D:href>/ab/contacts/</D:href>
    <D:propstat>
      <D:prop>
        <D:resourcetype>
          <D:collection/>
          <C:addressbook/>
        </D:resourcetype>
        <D:displayname>Contacts</D:displayname>
      </D:prop>
      <D:status>HTTP/1.1 200 OK</D:status>
    </D:propstat>
  </D:response>
</D:multistatus>";

    let parsed = parse_user_principal(xml).expect("Failed to parse principal");
    match parsed {
        PrincipalResponse::Addressbooks(infos) => {
            assert_eq!(infos.len(), 1);
            let info = infos.first().expect("info");
            assert_eq!(info.url, "/ab/contacts");
            assert_eq!(info.display_name.as_deref(), Some("Contacts"));
        }
        PrincipalResponse::Principal(_) => panic!("expected addressbook information"),
    }
}

#[test]
fn response_parse_empty_principal_is_empty_not_error() {
    let xml = "\
<?xml version=\"1.0\" encoding=\"utf-8\" ?>
<D:multistatus xmlns:D=\"DAV:\">
  <D:response>
    <D:href>/</D:href>
  </D:response>
</D:multistatus>";

    let parsed = parse_user_principal(xml).expect("parse");
    match parsed {
        PrincipalResponse::Principal(path) => assert!(path.is_empty()),
        PrincipalResponse::Addressbooks(_) => panic!("expected empty principal"),
    }
}

#[test]
fn response_parse_addressbook_home() {
    let xml = "\
<?xml version=\"1.0\" encoding=\"utf-8\" ?>
<D:multistatus xmlns:D=\"DAV:\" xmlns:C=\"urn:ietf:params:xml:ns:carddav\">
  <D:response>
    <D:href>/principals/users/jane/</D:href>
    <D:propstat>
      <D:prop>
        <C:addressbook-home-set>
          <D:href>https://dav.example.org/addressbooks/jane/</D:href>
        </C:addressbook-home-set>
      </D:prop>
      <D:status>HTTP/1.1 200 OK</D:status>
    </D:propstat>
  </D:response>
</D:multistatus>";

    let home = parse_addressbook_home(xml).expect("Failed to parse home");
    // absolute hrefs normalize to path-only form
    assert_eq!(home, "/addressbooks/jane/");
}

#[test]
fn response_parse_addressbook_information_with_markers() {
    let xml = "\
<?xml version=\"1.0\" encoding=\"utf-8\" ?>
<D:multistatus xmlns:D=\"DAV:\" xmlns:C=\"urn:ietf:params:xml:ns:carddav\" xmlns:CS=\"http://calendarserver.org/ns/\">
  <D:response>
    <D:href>/addressbooks/jane/contacts/</D:href>
    <D:propstat>
      <D:prop>
        <D:resourcetype>
          <D:collection/>
          <C:addressbook/>
        </D:resourcetype>
        <D:displayname>Contacts</D:displayname>
        <CS:getctag>ct-1</CS:getctag>
        <D:sync-token>st-1</D:sync-token>
      </D:prop>
      <D:status>HTTP/1.1 200 OK</D:status>
    </D:propstat>
  </D:response>
  <D:response>
    <D:href>/addressbooks/jane/plain-folder/</D:href>
    <D:propstat>
      <D:prop>
        <D:resourcetype>
          <D:collection/>
        </D:resourcetype>
      </D:prop>
      <D:status>HTTP/1.1 200 OK</D:status>
    </D:propstat>
  </D:response>
</D:multistatus>";

    let infos =
        parse_addressbook_information(xml, Some("/addressbooks/jane/")).expect("Failed to parse");

    // the plain collection is not an addressbook
    assert_eq!(infos.len(), 1);
    let info = infos.first().expect("info");
    assert_eq!(info.url, "/addressbooks/jane/contacts");
    assert_eq!(info.ctag.as_deref(), Some("ct-1"));
    assert_eq!(info.sync_token.as_deref(), Some("st-1"));
    assert_eq!(info.display_name.as_deref(), Some("Contacts"));
}

#[test]
fn response_addressbook_information_ignores_home_cycle() {
    let xml = "\
<?xml version=\"1.0\" encoding=\"utf-8\" ?>
<D:multistatus xmlns:D=\"DAV:\" xmlns:C=\"urn:ietf:params:xml:ns:carddav\">
  <D:response>
    <D:href>/addressbooks/jane/</D:href>
    <D:propstat>
      <D:prop>
        <D:resourcetype>
          <D:collection/>
          <C:addressbook/>
        </D:resourcetype>
      </D:prop>
      <D:status>HTTP/1.1 200 OK</D:status>
    </D:propstat>
  </D:response>
</D:multistatus>";

    // a server advertising the home itself as an addressbook must not
    // recurse
    let infos =
        parse_addressbook_information(xml, Some("/addressbooks/jane/")).expect("Failed to parse");
    assert!(infos.is_empty());

    // without the discovery context the entry is taken at face value
    let infos = parse_addressbook_information(xml, None).expect("Failed to parse");
    assert_eq!(infos.len(), 1);
}

#[test]
fn response_parse_sync_token_delta_classifies_amr() {
    let xml = "\
<?xml version=\"1.0\" encoding=\"utf-8\" ?>
<D:multistatus xmlns:D=\"DAV:\">
  <D:response>
    <D:href>/ab/alice.vcf</D:href>
    <D:propstat>
      <D:prop>
        <D:getetag>\"e1\"</D:getetag>
      </D:prop>
      <D:status>HTTP/1.1 200 OK</D:status>
    </D:propstat>
  </D:response>
  <D:response>
    <D:href>/ab/carol.vcf</D:href>
    <D:propstat>
      <D:prop>
        <D:getetag>\"e9\"</D:getetag>
      </D:prop>
      <D:status>HTTP/1.1 200 OK</D:status>
    </D:propstat>
  </D:response>
  <D:response>
    <D:href>/ab/bob.vcf</D:href>
    <D:status>HTTP/1.1 404 Not Found</D:status>
  </D:response>
  <D:sync-token>st-2</D:sync-token>
</D:multistatus>";

    let mut known = HashMap::new();
    known.insert("/ab/carol.vcf".to_string(), "guid-carol".to_string());
    known.insert("/ab/bob.vcf".to_string(), "guid-bob".to_string());

    let (infos, token) = parse_sync_token_delta(xml, &known).expect("Failed to parse delta");

    assert_eq!(token.as_deref(), Some("st-2"));
    assert_eq!(infos.len(), 3);

    let alice = infos.iter().find(|i| i.uri == "/ab/alice.vcf").expect("alice");
    assert_eq!(alice.kind, ModificationKind::Addition);
    assert_eq!(alice.etag, "\"e1\"");
    assert!(alice.guid.is_none());

    let carol = infos.iter().find(|i| i.uri == "/ab/carol.vcf").expect("carol");
    assert_eq!(carol.kind, ModificationKind::Modification);
    assert_eq!(carol.guid.as_deref(), Some("guid-carol"));

    let bob = infos.iter().find(|i| i.uri == "/ab/bob.vcf").expect("bob");
    assert_eq!(bob.kind, ModificationKind::Deletion);
    assert_eq!(bob.guid.as_deref(), Some("guid-bob"));
    assert!(bob.etag.is_empty());
}

#[test]
fn response_parse_contact_metadata_diffs_against_state() {
    // listing: a.vcf e1 (unchanged), c.vcf e3 (new); stored: a.vcf e1, b.vcf e2
    let xml = "\
<?xml version=\"1.0\" encoding=\"utf-8\" ?>
<D:multistatus xmlns:D=\"DAV:\">
  <D:response>
    <D:href>/ab/</D:href>
    <D:propstat>
      <D:prop><D:getetag>\"collection\"</D:getetag></D:prop>
      <D:status>HTTP/1.1 200 OK</D:status>
    </D:propstat>
  </D:response>
  <D:response>
    <D:href>/ab/a.vcf</D:href>
    <D:propstat>
      <D:prop><D:getetag>\"e1\"</D:getetag></D:prop>
      <D:status>HTTP/1.1 200 OK</D:status>
    </D:propstat>
  </D:response>
  <D:response>
    <D:href>/ab/c.vcf</D:href>
    <D:propstat>
      <D:prop><D:getetag>\"e3\"</D:getetag></D:prop>
      <D:status>HTTP/1.1 200 OK</D:status>
    </D:propstat>
  </D:response>
</D:multistatus>";

    let mut known_etags = HashMap::new();
    known_etags.insert("/ab/a.vcf".to_string(), "\"e1\"".to_string());
    known_etags.insert("/ab/b.vcf".to_string(), "\"e2\"".to_string());
    let mut known_guids = HashMap::new();
    known_guids.insert("/ab/a.vcf".to_string(), "guid-a".to_string());
    known_guids.insert("/ab/b.vcf".to_string(), "guid-b".to_string());

    let infos =
        parse_contact_metadata(xml, "/ab", &known_etags, &known_guids).expect("Failed to parse");

    assert_eq!(infos.len(), 2);
    let addition = infos
        .iter()
        .find(|i| i.kind == ModificationKind::Addition)
        .expect("addition");
    assert_eq!(addition.uri, "/ab/c.vcf");
    let deletion = infos
        .iter()
        .find(|i| i.kind == ModificationKind::Deletion)
        .expect("deletion");
    assert_eq!(deletion.uri, "/ab/b.vcf");
    assert_eq!(deletion.guid.as_deref(), Some("guid-b"));
    assert!(
        !infos
            .iter()
            .any(|i| i.kind == ModificationKind::Modification)
    );
}

#[test]
fn response_parse_contact_metadata_detects_changed_etag() {
    let xml = "\
<?xml version=\"1.0\" encoding=\"utf-8\" ?>
<D:multistatus xmlns:D=\"DAV:\">
  <D:response>
    <D:href>/ab/a.vcf</D:href>
    <D:propstat>
      <D:prop><D:getetag>\"e2\"</D:getetag></D:prop>
      <D:status>HTTP/1.1 200 OK</D:status>
    </D:propstat>
  </D:response>
</D:multistatus>";

    let mut known_etags = HashMap::new();
    known_etags.insert("/ab/a.vcf".to_string(), "\"e1\"".to_string());
    let mut known_guids = HashMap::new();
    known_guids.insert("/ab/a.vcf".to_string(), "guid-a".to_string());

    let infos =
        parse_contact_metadata(xml, "/ab", &known_etags, &known_guids).expect("Failed to parse");

    assert_eq!(infos.len(), 1);
    let info = infos.first().expect("info");
    assert_eq!(info.kind, ModificationKind::Modification);
    assert_eq!(info.etag, "\"e2\"");
    assert_eq!(info.guid.as_deref(), Some("guid-a"));
}

#[test]
fn response_parse_contact_data_stamps_guid() {
    let xml = "\
<?xml version=\"1.0\" encoding=\"utf-8\" ?>
<D:multistatus xmlns:D=\"DAV:\" xmlns:C=\"urn:ietf:params:xml:ns:carddav\">
  <D:response>
    <D:href>/ab/alice.vcf</D:href>
    <D:propstat>
      <D:prop>
        <D:getetag>\"e1\"</D:getetag>
        <C:address-data>BEGIN:VCARD\r\nVERSION:3.0\r\nUID:alice-uid\r\nFN:Alice Wonder\r\nN:Wonder;Alice;;;\r\nX-PET:rabbit\r\nEND:VCARD\r\n</C:address-data>
      </D:prop>
      <D:status>HTTP/1.1 200 OK</D:status>
    </D:propstat>
  </D:response>
</D:multistatus>";

    let contacts = parse_contact_data(xml, "/ab", 5).expect("Failed to parse contact data");

    assert_eq!(contacts.len(), 1);
    let full = contacts.get("/ab/alice.vcf").expect("alice");
    assert_eq!(full.uid, "alice-uid");
    assert_eq!(full.etag, "\"e1\"");
    assert_eq!(full.contact.guid_str(), "5:AB:/ab:alice-uid");
    assert_eq!(full.unsupported_properties, vec!["X-PET:rabbit"]);
    assert_eq!(
        full.contact.display_label.as_ref().map(|d| d.value.as_str()),
        Some("Alice Wonder")
    );
}

#[test]
fn response_href_normalization() {
    assert_eq!(normalize_href("/ab/alice.vcf"), "/ab/alice.vcf");
    assert_eq!(
        normalize_href("https://dav.example.org/ab/alice.vcf"),
        "/ab/alice.vcf"
    );
    assert_eq!(
        normalize_href("/ab/john%20doe.vcf"),
        "/ab/john doe.vcf"
    );
}
