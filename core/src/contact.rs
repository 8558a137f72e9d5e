// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! The contact value and its detail records.

use std::fmt;

/// A contact detail together with its user-modifiability marker.
///
/// Downstream UI consults the marker to decide whether a field may be
/// edited locally; the importer marks every detail of a downloaded
/// contact as modifiable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Detail<T> {
    /// The detail value.
    pub value: T,
    /// Whether the detail may be edited locally.
    pub modifiable: bool,
}

impl<T> Detail<T> {
    /// Creates a detail that is not locally modifiable.
    #[must_use]
    pub const fn new(value: T) -> Self {
        Self {
            value,
            modifiable: false,
        }
    }

    /// Creates a locally modifiable detail.
    #[must_use]
    pub const fn modifiable(value: T) -> Self {
        Self {
            value,
            modifiable: true,
        }
    }
}

/// Structured name parts (the vCard `N` property).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Name {
    /// Family name.
    pub last: String,
    /// Given name.
    pub first: String,
    /// Additional names.
    pub middle: String,
    /// Honorific prefix.
    pub prefix: String,
    /// Honorific suffix.
    pub suffix: String,
}

impl Name {
    /// Returns true when no name part carries data.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.last.is_empty()
            && self.first.is_empty()
            && self.middle.is_empty()
            && self.prefix.is_empty()
            && self.suffix.is_empty()
    }
}

/// Contact gender (the `X-GENDER` property).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Gender {
    /// Male.
    Male,
    /// Female.
    Female,
    /// Not specified.
    #[default]
    Unspecified,
}

impl Gender {
    /// Parses a gender value case-insensitively; anything unrecognized
    /// is [`Gender::Unspecified`].
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_uppercase().as_str() {
            "MALE" | "M" => Self::Male,
            "FEMALE" | "F" => Self::Female,
            _ => Self::Unspecified,
        }
    }

    /// The canonical property value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Male => "Male",
            Self::Female => "Female",
            Self::Unspecified => "Unspecified",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An email address with its vCard `TYPE` labels.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmailAddress {
    /// The address itself.
    pub address: String,
    /// Subtype labels (HOME, WORK, ...), preserved for round-trip.
    pub types: Vec<String>,
}

/// A phone number with its vCard `TYPE` labels.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhoneNumber {
    /// The number as stored on the server.
    pub number: String,
    /// Subtype labels (CELL, VOICE, ...), preserved for round-trip.
    pub types: Vec<String>,
}

/// A postal address (the seven `ADR` components).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostalAddress {
    /// Post office box.
    pub po_box: String,
    /// Extended address.
    pub extended: String,
    /// Street address.
    pub street: String,
    /// Locality (city).
    pub locality: String,
    /// Region (state or province).
    pub region: String,
    /// Postal code.
    pub postal_code: String,
    /// Country name.
    pub country: String,
    /// Subtype labels (HOME, WORK, ...), preserved for round-trip.
    pub types: Vec<String>,
}

/// A contact URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Website {
    /// The URL value.
    pub url: String,
}

/// How a photo value is carried in the vCard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhotoKind {
    /// A URI reference.
    Uri(String),
    /// Inline base64 data.
    Inline(String),
}

/// A contact photo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Photo {
    /// The photo payload.
    pub kind: PhotoKind,
    /// Media type of inline data, when declared.
    pub media_type: Option<String>,
}

/// A semantic contact record.
///
/// This is the local model the engine exchanges with the contact store;
/// the vCard converter maps it to and from the server's wire format.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Contact {
    /// The local contact-store identifier, when the contact is known to
    /// the store.
    pub id: Option<String>,
    /// The guid detail. Holds the raw server-side UID around
    /// conversion, and the addressbook-qualified sync GUID otherwise.
    pub guid: Option<Detail<String>>,
    /// Structured name.
    pub name: Option<Detail<Name>>,
    /// Display label (the vCard `FN` property).
    pub display_label: Option<Detail<String>>,
    /// Nickname.
    pub nickname: Option<Detail<String>>,
    /// Birthday, kept as the verbatim `BDAY` value.
    pub birthday: Option<Detail<String>>,
    /// Gender.
    pub gender: Option<Detail<Gender>>,
    /// Organization name.
    pub organization: Option<Detail<String>>,
    /// Job title.
    pub title: Option<Detail<String>>,
    /// Role within the organization.
    pub role: Option<Detail<String>>,
    /// Last revision timestamp, kept as the verbatim `REV` value.
    pub timestamp: Option<Detail<String>>,
    /// Email addresses, in vCard order.
    pub emails: Vec<Detail<EmailAddress>>,
    /// Phone numbers, in vCard order.
    pub phones: Vec<Detail<PhoneNumber>>,
    /// Postal addresses, in vCard order.
    pub addresses: Vec<Detail<PostalAddress>>,
    /// URLs, in vCard order.
    pub urls: Vec<Detail<Website>>,
    /// Photos, in vCard order.
    pub photos: Vec<Detail<Photo>>,
}

impl Contact {
    /// The guid detail value, or an empty string when absent.
    #[must_use]
    pub fn guid_str(&self) -> &str {
        self.guid.as_ref().map_or("", |g| g.value.as_str())
    }

    /// Replaces the guid detail, preserving its modifiable marker.
    pub fn set_guid(&mut self, guid: impl Into<String>) {
        match &mut self.guid {
            Some(detail) => detail.value = guid.into(),
            None => self.guid = Some(Detail::new(guid.into())),
        }
    }

    /// Marks every detail of the contact as locally modifiable.
    pub fn mark_all_modifiable(&mut self) {
        fn mark<T>(detail: &mut Option<Detail<T>>) {
            if let Some(d) = detail {
                d.modifiable = true;
            }
        }

        mark(&mut self.guid);
        mark(&mut self.name);
        mark(&mut self.display_label);
        mark(&mut self.nickname);
        mark(&mut self.birthday);
        mark(&mut self.gender);
        mark(&mut self.organization);
        mark(&mut self.title);
        mark(&mut self.role);
        mark(&mut self.timestamp);
        for d in &mut self.emails {
            d.modifiable = true;
        }
        for d in &mut self.phones {
            d.modifiable = true;
        }
        for d in &mut self.addresses {
            d.modifiable = true;
        }
        for d in &mut self.urls {
            d.modifiable = true;
        }
        for d in &mut self.photos {
            d.modifiable = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gender_parse_is_case_insensitive() {
        assert_eq!(Gender::parse("male"), Gender::Male);
        assert_eq!(Gender::parse("FEMALE"), Gender::Female);
        assert_eq!(Gender::parse("other"), Gender::Unspecified);
        assert_eq!(Gender::parse(""), Gender::Unspecified);
    }

    #[test]
    fn mark_all_modifiable_covers_collections() {
        let mut c = Contact {
            nickname: Some(Detail::new("Ace".to_string())),
            emails: vec![Detail::new(EmailAddress {
                address: "a@example.org".to_string(),
                types: Vec::new(),
            })],
            ..Contact::default()
        };
        c.mark_all_modifiable();
        assert!(c.nickname.as_ref().is_some_and(|d| d.modifiable));
        assert!(c.emails.iter().all(|d| d.modifiable));
    }

    #[test]
    fn set_guid_keeps_marker() {
        let mut c = Contact {
            guid: Some(Detail::modifiable("old".to_string())),
            ..Contact::default()
        };
        c.set_guid("new");
        let guid = c.guid.expect("guid");
        assert_eq!(guid.value, "new");
        assert!(guid.modifiable);
    }
}
