// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User model for storage and API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Application user stored in Firestore (`users/{uid}`).
///
/// Field names match the documents written by the existing web frontend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppUser {
    /// Directory-assigned user ID. Read from the Firestore document ID and
    /// never stored as a field; older documents have no `uid` field.
    #[serde(alias = "_firestore_id", default, skip_serializing)]
    pub uid: String,
    #[serde(rename = "displayName", default)]
    pub display_name: String,
    #[serde(rename = "photoURL", default)]
    pub photo_url: String,
    /// Linked Zalo user ID. Absent when the user never linked or opted out.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zalo_uid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birthday: Option<String>,
    /// Grants access to the message sending routes
    #[serde(default)]
    pub admin: bool,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

/// Fields known when a user is first created.
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub display_name: String,
    pub photo_url: String,
}

/// Uniqueness record for a Zalo link (`zalo_links/{zalo_uid}`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZaloLink {
    /// Owner of the link
    pub uid: String,
    pub linked_at: String,
    /// Server write time, used as a delete precondition
    #[serde(alias = "_firestore_updated", default, skip_serializing)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn absent_link_is_not_serialized() {
        let user = AppUser {
            uid: "u1".to_string(),
            display_name: "Lan".to_string(),
            photo_url: "https://example.com/a.jpg".to_string(),
            zalo_uid: None,
            gender: None,
            birthday: None,
            admin: false,
            created_at: "2026-01-01T00:00:00Z".to_string(),
            updated_at: "2026-01-01T00:00:00Z".to_string(),
        };

        let value = serde_json::to_value(&user).unwrap();
        assert!(value.get("uid").is_none());
        assert_eq!(value["displayName"], "Lan");
        assert_eq!(value["photoURL"], "https://example.com/a.jpg");
        assert!(value.get("zalo_uid").is_none());
    }

    #[test]
    fn uid_comes_from_document_id() {
        // Shape the firestore deserializer produces for `users/{uid}` documents
        // written by the web frontend.
        let user: AppUser = serde_json::from_value(json!({
            "_firestore_id": "k2Yq81",
            "_firestore_full_id": "projects/p/databases/(default)/documents/users/k2Yq81",
            "displayName": "Minh",
            "photoURL": "",
            "zalo_uid": "8421",
            "gender": "male",
            "birthday": "01/01/1990"
        }))
        .unwrap();

        assert_eq!(user.uid, "k2Yq81");
        assert_eq!(user.zalo_uid.as_deref(), Some("8421"));
    }

    #[test]
    fn legacy_document_without_timestamps_parses() {
        let user: AppUser = serde_json::from_value(json!({
            "uid": "u2",
            "displayName": "Minh",
            "photoURL": "",
            "zalo_uid": "8421"
        }))
        .unwrap();

        assert_eq!(user.zalo_uid.as_deref(), Some("8421"));
        assert!(!user.admin);
        assert!(user.created_at.is_empty());
    }
}
