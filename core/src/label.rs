// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Display-label synthesis and decomposition.
//!
//! Servers may provide an `FN` without an `N`, or vice versa; these
//! helpers bridge the two representations when one side is missing.

use crate::contact::{Contact, Name};

/// Generates a display label for a contact.
///
/// Preference order: structured name, display label, nickname,
/// organization, first email address. Returns an empty string when
/// nothing usable exists.
#[must_use]
pub fn generate_display_label(contact: &Contact) -> String {
    if let Some(name) = &contact.name {
        let joined = [
            name.value.first.as_str(),
            name.value.middle.as_str(),
            name.value.last.as_str(),
        ]
        .iter()
        .filter(|part| !part.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(" ");
        if !joined.is_empty() {
            return joined;
        }
    }
    if let Some(label) = &contact.display_label {
        if !label.value.trim().is_empty() {
            return label.value.trim().to_string();
        }
    }
    if let Some(nickname) = &contact.nickname {
        if !nickname.value.trim().is_empty() {
            return nickname.value.trim().to_string();
        }
    }
    if let Some(org) = &contact.organization {
        if !org.value.trim().is_empty() {
            return org.value.trim().to_string();
        }
    }
    if let Some(email) = contact.emails.first() {
        return email.value.address.clone();
    }
    String::new()
}

/// Decomposes a display label into structured name parts.
///
/// One token becomes the first name, two become first and last, and
/// anything longer keeps the middle tokens as additional names.
#[must_use]
pub fn decompose_display_label(label: &str) -> Name {
    let tokens: Vec<&str> = label.split_whitespace().collect();
    match tokens.as_slice() {
        [] => Name::default(),
        [first] => Name {
            first: (*first).to_string(),
            ..Name::default()
        },
        [first, last] => Name {
            first: (*first).to_string(),
            last: (*last).to_string(),
            ..Name::default()
        },
        [first, middle @ .., last] => Name {
            first: (*first).to_string(),
            middle: middle.join(" "),
            last: (*last).to_string(),
            ..Name::default()
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contact::Detail;

    #[test]
    fn decompose_single_token_becomes_first_name() {
        let name = decompose_display_label("Cher");
        assert_eq!(name.first, "Cher");
        assert!(name.last.is_empty());
    }

    #[test]
    fn decompose_two_tokens() {
        let name = decompose_display_label("Jane Public");
        assert_eq!(name.first, "Jane");
        assert_eq!(name.last, "Public");
    }

    #[test]
    fn decompose_keeps_middle_tokens() {
        let name = decompose_display_label("Jane Q Public");
        assert_eq!(name.first, "Jane");
        assert_eq!(name.middle, "Q");
        assert_eq!(name.last, "Public");
    }

    #[test]
    fn label_prefers_structured_name() {
        let contact = Contact {
            name: Some(Detail::new(Name {
                first: "Jane".to_string(),
                last: "Public".to_string(),
                ..Name::default()
            })),
            display_label: Some(Detail::new("ignored".to_string())),
            ..Contact::default()
        };
        assert_eq!(generate_display_label(&contact), "Jane Public");
    }

    #[test]
    fn label_falls_back_through_nickname_to_email() {
        let mut contact = Contact {
            nickname: Some(Detail::new("Ace".to_string())),
            ..Contact::default()
        };
        assert_eq!(generate_display_label(&contact), "Ace");

        contact.nickname = None;
        contact.emails.push(Detail::new(crate::contact::EmailAddress {
            address: "a@example.org".to_string(),
            types: Vec::new(),
        }));
        assert_eq!(generate_display_label(&contact), "a@example.org");
    }
}
