// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! vCard documents: BEGIN/END framing over property lists.

use crate::error::VCardError;
use crate::property::Property;
use crate::syntax;

/// A parsed vCard document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    /// Properties in source order, excluding the BEGIN/END markers.
    pub properties: Vec<Property>,
}

impl Document {
    /// Parses text into the vCard documents it contains.
    ///
    /// # Errors
    ///
    /// Returns an error on malformed content lines or unbalanced
    /// BEGIN/END markers. Properties outside a document are rejected.
    pub fn parse_all(text: &str) -> Result<Vec<Self>, VCardError> {
        let mut documents = Vec::new();
        let mut current: Option<Self> = None;

        for line in syntax::unfold(text) {
            let property = Property::parse(&line)?;
            match property.name.as_str() {
                "BEGIN" if property.value.eq_ignore_ascii_case("VCARD") => {
                    if current.is_some() {
                        return Err(VCardError::UnbalancedDocument);
                    }
                    current = Some(Self::default());
                }
                "END" if property.value.eq_ignore_ascii_case("VCARD") => match current.take() {
                    Some(doc) => documents.push(doc),
                    None => return Err(VCardError::UnbalancedDocument),
                },
                _ => match &mut current {
                    Some(doc) => doc.properties.push(property),
                    None => return Err(VCardError::UnbalancedDocument),
                },
            }
        }

        if current.is_some() {
            return Err(VCardError::UnbalancedDocument);
        }
        Ok(documents)
    }

    /// Formats the document as CRLF-terminated vCard text, folding long
    /// lines.
    #[must_use]
    pub fn format(&self) -> String {
        let mut out = String::new();
        out.push_str("BEGIN:VCARD\r\n");
        for property in &self.properties {
            out.push_str(&syntax::fold(&property.format_line()));
            out.push_str("\r\n");
        }
        out.push_str("END:VCARD\r\n");
        out
    }

    /// The first property with the given name, if any.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }
}

/// Serializes a single property to its content-line form by formatting
/// a one-property document and stripping the BEGIN/VERSION/END
/// scaffolding.
#[must_use]
pub fn property_to_line(property: &Property) -> String {
    let doc = Document {
        properties: vec![Property::new("VERSION", "3.0"), property.clone()],
    };
    let formatted = doc.format();
    formatted
        .lines()
        .skip(2) // BEGIN:VCARD, VERSION:3.0
        .take_while(|line| *line != "END:VCARD")
        .collect::<Vec<_>>()
        .join("\r\n")
}
