// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Bidirectional conversion between vCard text and contacts.
//!
//! Only a small core of vCard properties is modeled structurally; every
//! other property is captured verbatim on import and stitched back into
//! the uploaded vCard, so modifications never drop server-side data the
//! local model does not understand.

use abook_core::{
    Contact, Detail, EmailAddress, Gender, Name, PhoneNumber, PostalAddress, Website,
    decompose_display_label, generate_display_label,
};
use log::{debug, warn};

use crate::document::{Document, property_to_line};
use crate::error::VCardError;
use crate::photo::{export_photo_property, import_photo_property};
use crate::property::{Parameter, Property};
use crate::syntax::{escape_text, split_structured, unescape_text};

/// The property names the converter models structurally. Everything
/// else is cached for round-trip.
#[must_use]
pub fn supported_property_names() -> &'static [&'static str] {
    &[
        "VERSION", "PRODID", "REV", "N", "FN", "NICKNAME", "BDAY", "X-GENDER", "EMAIL", "TEL",
        "ADR", "URL", "PHOTO", "ORG", "TITLE", "ROLE", "UID",
    ]
}

/// Imports vCard text into a contact plus its unsupported property
/// lines, in source order.
///
/// The input must contain exactly one document. Duplicate BDAY, REV,
/// UID and X-GENDER properties are dropped (the first occurrence wins),
/// a missing structured name is synthesized from the display label or
/// nickname, and every resulting detail is marked modifiable.
///
/// # Errors
///
/// Returns an error on malformed vCard text or when the input does not
/// contain exactly one document.
pub fn import_vcard(vcard: &str) -> Result<(Contact, Vec<String>), VCardError> {
    let mut documents = Document::parse_all(vcard)?;
    if documents.len() != 1 {
        warn!(
            "invalid results during vcard import, got {} documents",
            documents.len()
        );
        return Err(VCardError::DocumentCount(documents.len()));
    }
    let document = documents.remove(0);

    let mut contact = Contact::default();
    // document-scoped scratch for unsupported lines
    let mut unsupported: Vec<String> = Vec::new();
    for property in &document.properties {
        import_property(property, &mut contact, &mut unsupported);
    }

    synthesize_name(&mut contact);
    contact.mark_all_modifiable();
    Ok((contact, unsupported))
}

fn import_property(property: &Property, contact: &mut Contact, unsupported: &mut Vec<String>) {
    match property.name.as_str() {
        // consumed; regenerated on export
        "VERSION" | "PRODID" => {}

        "N" => {
            if contact.name.is_none() {
                contact.name = Some(Detail::new(parse_name(&property.value)));
            }
        }
        "FN" => {
            if contact.display_label.is_none() {
                contact.display_label = Some(Detail::new(unescape_text(&property.value)));
            }
        }
        "NICKNAME" => {
            if contact.nickname.is_none() {
                contact.nickname = Some(Detail::new(unescape_text(&property.value)));
            }
        }
        "BDAY" => {
            if contact.birthday.is_some() {
                debug!("removed duplicate BDAY property: {}", property.value);
            } else {
                contact.birthday = Some(Detail::new(property.value.clone()));
            }
        }
        "REV" => {
            if contact.timestamp.is_some() {
                debug!("removed duplicate REV property: {}", property.value);
            } else {
                contact.timestamp = Some(Detail::new(property.value.clone()));
            }
        }
        "UID" => {
            if contact.guid.is_some() {
                debug!("removed duplicate UID property: {}", property.value);
            } else {
                contact.guid = Some(Detail::new(property.value.clone()));
            }
        }
        "X-GENDER" => {
            if contact.gender.is_some() {
                debug!("removed duplicate X-GENDER property: {}", property.value);
            } else {
                contact.gender = Some(Detail::new(Gender::parse(&property.value)));
            }
        }
        "ORG" => {
            if contact.organization.is_none() {
                contact.organization = Some(Detail::new(property.value.clone()));
            }
        }
        "TITLE" => {
            if contact.title.is_none() {
                contact.title = Some(Detail::new(unescape_text(&property.value)));
            }
        }
        "ROLE" => {
            if contact.role.is_none() {
                contact.role = Some(Detail::new(unescape_text(&property.value)));
            }
        }
        "EMAIL" => contact.emails.push(Detail::new(EmailAddress {
            address: unescape_text(&property.value),
            types: property.types(),
        })),
        "TEL" => contact.phones.push(Detail::new(PhoneNumber {
            number: unescape_text(&property.value),
            types: property.types(),
        })),
        "ADR" => contact
            .addresses
            .push(Detail::new(parse_address(property))),
        "URL" => contact.urls.push(Detail::new(Website {
            url: property.value.clone(),
        })),
        "PHOTO" => {
            // the avatar importer decides; an empty avatar drops the
            // property entirely rather than caching it
            if let Some(photo) = import_photo_property(property) {
                contact.photos.push(Detail::new(photo));
            }
        }
        _ => unsupported.push(property_to_line(property)),
    }
}

fn parse_name(value: &str) -> Name {
    let mut parts = split_structured(value).into_iter();
    Name {
        last: parts.next().unwrap_or_default(),
        first: parts.next().unwrap_or_default(),
        middle: parts.next().unwrap_or_default(),
        prefix: parts.next().unwrap_or_default(),
        suffix: parts.next().unwrap_or_default(),
    }
}

fn parse_address(property: &Property) -> PostalAddress {
    let mut parts = split_structured(&property.value).into_iter();
    PostalAddress {
        po_box: parts.next().unwrap_or_default(),
        extended: parts.next().unwrap_or_default(),
        street: parts.next().unwrap_or_default(),
        locality: parts.next().unwrap_or_default(),
        region: parts.next().unwrap_or_default(),
        postal_code: parts.next().unwrap_or_default(),
        country: parts.next().unwrap_or_default(),
        types: property.types(),
    }
}

/// Fills in a best-guess structured name when the vCard provided none.
fn synthesize_name(contact: &mut Contact) {
    let has_name = contact
        .name
        .as_ref()
        .is_some_and(|n| !n.value.first.is_empty() || !n.value.last.is_empty());
    if has_name {
        return;
    }

    let label = contact
        .display_label
        .as_ref()
        .map(|d| d.value.trim().to_string())
        .filter(|v| !v.is_empty());
    let nickname = contact
        .nickname
        .as_ref()
        .map(|d| d.value.trim().to_string())
        .filter(|v| !v.is_empty());

    if let Some(source) = label.or(nickname) {
        let name = decompose_display_label(&source);
        debug!("decomposed vCard label into structured name: {name:?}");
        contact.name = Some(Detail::new(name));
    } else {
        warn!("no structured name data exists in the vCard, contact will be unnamed");
    }
}

/// Exports a contact and its cached unsupported property lines as vCard
/// 3.0 text.
///
/// FN and N are synthesized when absent; X-GENDER is omitted when the
/// gender is unspecified; the unsupported lines are inserted verbatim
/// immediately before the terminal `END:VCARD`, preserving order.
#[must_use]
pub fn export_vcard(contact: &Contact, unsupported: &[String]) -> String {
    let mut doc = Document::default();
    let props = &mut doc.properties;

    props.push(Property::new("VERSION", "3.0"));
    props.push(Property::new("PRODID", "-//abook//abook-vcard//EN"));
    if let Some(rev) = &contact.timestamp {
        props.push(Property::new("REV", rev.value.clone()));
    }
    if let Some(guid) = &contact.guid {
        if !guid.value.is_empty() {
            props.push(Property::new("UID", guid.value.clone()));
        }
    }

    props.push(name_property(contact));
    props.push(fn_property(contact));

    if let Some(nickname) = &contact.nickname {
        props.push(Property::new("NICKNAME", escape_text(&nickname.value)));
    }
    if let Some(birthday) = &contact.birthday {
        props.push(Property::new("BDAY", birthday.value.clone()));
    }
    if let Some(gender) = &contact.gender {
        // stored by default even when the user never set one; suppress
        // the meaningless value
        if gender.value != Gender::Unspecified {
            props.push(Property::new("X-GENDER", gender.value.as_str()));
        }
    }
    if let Some(org) = &contact.organization {
        props.push(Property::new("ORG", org.value.clone()));
    }
    if let Some(title) = &contact.title {
        props.push(Property::new("TITLE", escape_text(&title.value)));
    }
    if let Some(role) = &contact.role {
        props.push(Property::new("ROLE", escape_text(&role.value)));
    }
    for email in &contact.emails {
        props.push(typed_property(
            "EMAIL",
            escape_text(&email.value.address),
            &email.value.types,
        ));
    }
    for phone in &contact.phones {
        props.push(typed_property(
            "TEL",
            escape_text(&phone.value.number),
            &phone.value.types,
        ));
    }
    for address in &contact.addresses {
        props.push(address_property(&address.value));
    }
    for url in &contact.urls {
        props.push(Property::new("URL", url.value.url.clone()));
    }
    for photo in &contact.photos {
        props.push(export_photo_property(&photo.value));
    }

    let mut out = doc.format();
    // stitch the verbatim lines back in, each just before END:VCARD
    for line in unsupported {
        if let Some(idx) = out.rfind("END:VCARD") {
            out.insert_str(idx, &format!("{line}\r\n"));
        }
    }
    out
}

fn name_property(contact: &Contact) -> Property {
    if let Some(name) = &contact.name {
        if !name.value.is_empty() {
            let n = &name.value;
            let value = [
                n.last.as_str(),
                n.first.as_str(),
                n.middle.as_str(),
                n.prefix.as_str(),
                n.suffix.as_str(),
            ]
            .iter()
            .map(|part| escape_text(part))
            .collect::<Vec<_>>()
            .join(";");
            return Property::new("N", value);
        }
    }

    // decompose the display label; a label that yields no first name is
    // assumed to be a useful first name itself
    let label = generate_display_label(contact);
    let mut name = decompose_display_label(&label);
    if name.first.is_empty() {
        name.first = label;
    }
    Property::new(
        "N",
        format!("{};{};;;", escape_text(&name.last), escape_text(&name.first)),
    )
}

fn fn_property(contact: &Contact) -> Property {
    let label = contact
        .display_label
        .as_ref()
        .map(|d| d.value.clone())
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| generate_display_label(contact));
    Property::new("FN", escape_text(&label))
}

fn typed_property(name: &str, value: String, types: &[String]) -> Property {
    let mut property = Property::new(name, value);
    if !types.is_empty() {
        property.params.push(Parameter {
            name: "TYPE".to_string(),
            values: types.to_vec(),
        });
    }
    property
}

fn address_property(address: &PostalAddress) -> Property {
    let value = [
        address.po_box.as_str(),
        address.extended.as_str(),
        address.street.as_str(),
        address.locality.as_str(),
        address.region.as_str(),
        address.postal_code.as_str(),
        address.country.as_str(),
    ]
    .iter()
    .map(|part| escape_text(part))
    .collect::<Vec<_>>()
    .join(";");
    typed_property("ADR", value, &address.types)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALICE: &str = "BEGIN:VCARD\r\n\
VERSION:3.0\r\n\
UID:alice-uid-1\r\n\
N:Wonder;Alice;;;\r\n\
FN:Alice Wonder\r\n\
EMAIL;TYPE=HOME:alice@example.org\r\n\
TEL;TYPE=CELL:+1234567\r\n\
END:VCARD\r\n";

    #[test]
    fn import_maps_supported_properties() {
        let (contact, unsupported) = import_vcard(ALICE).expect("import");
        assert!(unsupported.is_empty());
        assert_eq!(contact.guid_str(), "alice-uid-1");
        let name = contact.name.as_ref().expect("name");
        assert_eq!(name.value.first, "Alice");
        assert_eq!(name.value.last, "Wonder");
        assert_eq!(contact.emails.len(), 1);
        assert_eq!(
            contact.emails.first().expect("email").value.types,
            vec!["HOME"]
        );
        assert_eq!(contact.phones.len(), 1);
    }

    #[test]
    fn import_marks_details_modifiable() {
        let (contact, _) = import_vcard(ALICE).expect("import");
        assert!(contact.name.as_ref().is_some_and(|d| d.modifiable));
        assert!(contact.emails.iter().all(|d| d.modifiable));
    }

    #[test]
    fn import_rejects_multiple_documents() {
        let doubled = format!("{ALICE}{ALICE}");
        assert!(matches!(
            import_vcard(&doubled),
            Err(VCardError::DocumentCount(2))
        ));
    }

    #[test]
    fn import_deduplicates_unique_properties() {
        let vcard = "BEGIN:VCARD\r\n\
VERSION:3.0\r\n\
UID:first\r\n\
UID:second\r\n\
BDAY:1990-01-01\r\n\
BDAY:1991-01-01\r\n\
FN:Dup Test\r\n\
END:VCARD\r\n";
        let (contact, _) = import_vcard(vcard).expect("import");
        assert_eq!(contact.guid_str(), "first");
        assert_eq!(
            contact.birthday.as_ref().map(|d| d.value.as_str()),
            Some("1990-01-01")
        );
    }

    #[test]
    fn import_synthesizes_name_from_label() {
        let vcard = "BEGIN:VCARD\r\nVERSION:3.0\r\nFN:Jane Q Public\r\nEND:VCARD\r\n";
        let (contact, _) = import_vcard(vcard).expect("import");
        let name = contact.name.as_ref().expect("name");
        assert_eq!(name.value.first, "Jane");
        assert_eq!(name.value.middle, "Q");
        assert_eq!(name.value.last, "Public");
    }

    #[test]
    fn import_synthesizes_name_from_nickname_when_no_label() {
        let vcard = "BEGIN:VCARD\r\nVERSION:3.0\r\nNICKNAME:Ace\r\nEND:VCARD\r\n";
        let (contact, _) = import_vcard(vcard).expect("import");
        let name = contact.name.as_ref().expect("name");
        assert_eq!(name.value.first, "Ace");
        assert!(name.value.last.is_empty());
    }

    #[test]
    fn export_filters_unspecified_gender() {
        let (mut contact, _) = import_vcard(ALICE).expect("import");
        contact.gender = Some(Detail::new(Gender::Unspecified));
        let out = export_vcard(&contact, &[]);
        assert!(!out.contains("X-GENDER"));

        contact.gender = Some(Detail::new(Gender::Female));
        let out = export_vcard(&contact, &[]);
        assert!(out.contains("X-GENDER:Female"));
    }

    #[test]
    fn export_keeps_structured_name() {
        let (contact, _) = import_vcard(ALICE).expect("import");
        let out = export_vcard(&contact, &[]);
        assert!(out.contains("N:Wonder;Alice;;;"));
        assert!(out.contains("FN:Alice Wonder"));
    }

    #[test]
    fn round_trip_preserves_details() {
        let (contact, unsupported) = import_vcard(ALICE).expect("import");
        let out = export_vcard(&contact, &unsupported);
        let (again, _) = import_vcard(&out).expect("reimport");
        assert_eq!(contact, again);
    }
}
