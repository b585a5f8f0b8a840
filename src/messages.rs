//! The shared message board between administrators and viewers.

use crate::error::{RentRollError, Result};
use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "ADMIN")]
    Admin,
    #[serde(rename = "USER")]
    Viewer,
}

impl Role {
    pub fn is_admin(&self) -> bool {
        matches!(self, Self::Admin)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Assigned by the store; `None` until the message has been written.
    pub id: Option<String>,
    pub text: String,
    pub from_user: String,
    pub from_role: Role,
    pub ts: DateTime<Utc>,
}

impl Message {
    pub fn from_document(id: &str, document: &Value) -> Result<Self> {
        let text = document
            .get("text")
            .and_then(Value::as_str)
            .ok_or_else(|| RentRollError::MalformedDocument(format!("message {} has no text", id)))?;
        let from_role = match document.get("fromRole").and_then(Value::as_str) {
            Some("ADMIN") => Role::Admin,
            _ => Role::Viewer,
        };
        let ts = document
            .get("ts")
            .and_then(Value::as_str)
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_default();

        Ok(Self {
            id: Some(id.to_string()),
            text: text.to_string(),
            from_user: document
                .get("fromUser")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_lowercase(),
            from_role,
            ts,
        })
    }

    pub fn to_document(&self) -> Value {
        json!({
            "text": self.text,
            "fromRole": self.from_role,
            "fromUser": self.from_user,
            "ts": self.ts.to_rfc3339(),
        })
    }

    /// `DD/MM/YYYY HH:MM` in UTC.
    pub fn formatted_time(&self) -> String {
        self.ts.format("%d/%m/%Y %H:%M").to_string()
    }
}

/// Builds an outgoing message. Blank text yields `None`.
pub fn new_message(text: &str, role: Role, username: &str, ts: DateTime<Utc>) -> Option<Message> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    Some(Message {
        id: None,
        text: text.to_string(),
        from_user: username.trim().to_lowercase(),
        from_role: role,
        ts,
    })
}

/// Administrators may delete any message, everyone else only their own.
pub fn can_delete(message: &Message, role: Role, username: &str) -> bool {
    role.is_admin() || message.from_user.eq_ignore_ascii_case(username.trim())
}

/// Messages in conversation order, oldest first.
pub fn thread(mut messages: Vec<Message>) -> Vec<Message> {
    messages.sort_by_key(|m| m.ts);
    messages
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
}

/// Known users, keyed by lowercase username.
#[derive(Debug, Clone, Default)]
pub struct UserDirectory {
    users: BTreeMap<String, UserProfile>,
}

impl UserDirectory {
    /// Builds the directory from `(document id, document)` pairs. The
    /// username comes from the document, falling back to its id.
    pub fn from_documents<'a, I>(documents: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a Value)>,
    {
        let field = |doc: &Value, name: &str| {
            doc.get(name)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .trim()
                .to_string()
        };

        let mut users = BTreeMap::new();
        for (id, document) in documents {
            let username = Some(field(document, "username"))
                .filter(|u| !u.is_empty())
                .unwrap_or_else(|| id.trim().to_string());
            if username.is_empty() {
                debug!("Skipping user document without a username");
                continue;
            }
            users.insert(
                username.to_lowercase(),
                UserProfile {
                    first_name: field(document, "firstName"),
                    last_name: field(document, "lastName"),
                    username,
                },
            );
        }
        Self { users }
    }

    pub fn get(&self, username: &str) -> Option<&UserProfile> {
        self.users.get(&username.trim().to_lowercase())
    }

    /// "First Last" when known, otherwise the username, otherwise "Usuario".
    pub fn display_name(&self, username: &str) -> String {
        if let Some(profile) = self.get(username) {
            let full = format!("{} {}", profile.first_name, profile.last_name);
            let full = full.trim();
            if !full.is_empty() {
                return full.to_string();
            }
            if !profile.username.is_empty() {
                return profile.username.clone();
            }
        }

        let username = username.trim();
        if username.is_empty() {
            "Usuario".to_string()
        } else {
            username.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, 14, minute, 0).unwrap()
    }

    #[test]
    fn test_new_message() {
        let message = new_message("  hola  ", Role::Viewer, "JPerez", at(0)).unwrap();
        assert_eq!(message.text, "hola");
        assert_eq!(message.from_user, "jperez");
        assert!(new_message("   ", Role::Admin, "admin", at(0)).is_none());
    }

    #[test]
    fn test_can_delete() {
        let message = new_message("hola", Role::Viewer, "jperez", at(0)).unwrap();
        assert!(can_delete(&message, Role::Viewer, "JPEREZ"));
        assert!(!can_delete(&message, Role::Viewer, "other"));
        assert!(can_delete(&message, Role::Admin, "boss"));
    }

    #[test]
    fn test_thread_sorted() {
        let late = new_message("b", Role::Viewer, "u", at(30)).unwrap();
        let early = new_message("a", Role::Viewer, "u", at(5)).unwrap();
        let sorted = thread(vec![late, early]);
        assert_eq!(sorted[0].text, "a");
        assert_eq!(sorted[1].formatted_time(), "10/03/2025 14:30");
    }

    #[test]
    fn test_document_round_trip() {
        let message = new_message("hola", Role::Admin, "Boss", at(1)).unwrap();
        let doc = message.to_document();
        assert_eq!(doc["fromRole"], json!("ADMIN"));

        let back = Message::from_document("m1", &doc).unwrap();
        assert_eq!(back.id.as_deref(), Some("m1"));
        assert_eq!(back.from_role, Role::Admin);
        assert_eq!(back.ts, message.ts);
        assert!(Message::from_document("m2", &json!({})).is_err());
    }

    #[test]
    fn test_display_name() {
        let docs = vec![
            ("ana".to_string(), json!({ "firstName": "Ana", "lastName": "Rojas" })),
            ("x".to_string(), json!({ "username": "Pedro" })),
        ];
        let directory =
            UserDirectory::from_documents(docs.iter().map(|(id, doc)| (id.as_str(), doc)));

        assert_eq!(directory.display_name("ANA"), "Ana Rojas");
        assert_eq!(directory.display_name("pedro"), "Pedro");
        assert_eq!(directory.display_name("ghost"), "ghost");
        assert_eq!(directory.display_name(""), "Usuario");
    }
}
