// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! PHOTO property import and export.

use abook_core::{Photo, PhotoKind};

use crate::property::{Parameter, Property};

/// Imports a `PHOTO` property into an avatar value.
///
/// Returns `None` when the property carries no usable data, in which
/// case the property is dropped rather than cached.
#[must_use]
pub fn import_photo_property(property: &Property) -> Option<Photo> {
    let value = property.value.trim();
    if value.is_empty() {
        return None;
    }

    let is_uri = property
        .param("VALUE")
        .is_some_and(|v| v.eq_ignore_ascii_case("uri"))
        || value.starts_with("http://")
        || value.starts_with("https://");
    if is_uri {
        return Some(Photo {
            kind: PhotoKind::Uri(value.to_string()),
            media_type: None,
        });
    }

    let is_inline = property
        .param("ENCODING")
        .is_some_and(|v| v.eq_ignore_ascii_case("b") || v.eq_ignore_ascii_case("base64"));
    if is_inline {
        return Some(Photo {
            kind: PhotoKind::Inline(value.to_string()),
            media_type: property.param("TYPE").map(str::to_string),
        });
    }

    // no marker either way; treat the value as a reference
    Some(Photo {
        kind: PhotoKind::Uri(value.to_string()),
        media_type: None,
    })
}

/// Exports an avatar value back to a `PHOTO` property.
#[must_use]
pub fn export_photo_property(photo: &Photo) -> Property {
    match &photo.kind {
        PhotoKind::Uri(uri) => Property {
            group: None,
            name: "PHOTO".to_string(),
            params: vec![Parameter {
                name: "VALUE".to_string(),
                values: vec!["uri".to_string()],
            }],
            value: uri.clone(),
        },
        PhotoKind::Inline(data) => {
            let mut params = vec![Parameter {
                name: "ENCODING".to_string(),
                values: vec!["b".to_string()],
            }];
            if let Some(media_type) = &photo.media_type {
                params.push(Parameter {
                    name: "TYPE".to_string(),
                    values: vec![media_type.clone()],
                });
            }
            Property {
                group: None,
                name: "PHOTO".to_string(),
                params,
                value: data.clone(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_photo_is_dropped() {
        let p = Property::parse("PHOTO:").expect("parse");
        assert!(import_photo_property(&p).is_none());
    }

    #[test]
    fn uri_photo_is_recognized() {
        let p = Property::parse("PHOTO;VALUE=uri:https://example.org/me.png").expect("parse");
        let photo = import_photo_property(&p).expect("photo");
        assert_eq!(
            photo.kind,
            PhotoKind::Uri("https://example.org/me.png".to_string())
        );
    }

    #[test]
    fn inline_photo_keeps_media_type() {
        let p = Property::parse("PHOTO;ENCODING=b;TYPE=JPEG:AAAA").expect("parse");
        let photo = import_photo_property(&p).expect("photo");
        assert_eq!(photo.kind, PhotoKind::Inline("AAAA".to_string()));
        assert_eq!(photo.media_type.as_deref(), Some("JPEG"));
    }

    #[test]
    fn export_round_trips_inline() {
        let photo = Photo {
            kind: PhotoKind::Inline("AAAA".to_string()),
            media_type: Some("JPEG".to_string()),
        };
        let p = export_photo_property(&photo);
        assert_eq!(import_photo_property(&p), Some(photo));
    }
}
