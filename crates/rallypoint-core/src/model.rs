//! Chat messages and groups, as shared by every transport.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A displayable chat message, tagged with the group it belongs to.
///
/// Messages carry no id: identity is implicit, and thread order is the order
/// in which the router received them. The timestamp is stamped client-side
/// at send time and is informational only — it is never used for ordering
/// or deduplication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Responder identifier (or display name) of the sender
    pub sender: String,
    /// Message body
    pub text: String,
    /// Group the message is scoped to
    #[serde(rename = "groupId")]
    pub group_id: String,
    /// Client-side send time (RFC 3339 on the wire)
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    /// Build a message stamped with the current time.
    #[must_use]
    pub fn new(
        group_id: impl Into<String>,
        sender: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            sender: sender.into(),
            text: text.into(),
            group_id: group_id.into(),
            timestamp: Utc::now(),
        }
    }
}

/// A chat group: a named scope with a flat member list.
///
/// Groups are either seeded at startup or created client-side; there is no
/// role distinction inside a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    /// Unique id within the registry
    pub id: String,
    /// Display name
    pub name: String,
    /// Responder identifiers
    pub members: Vec<String>,
}

impl Group {
    /// Create a group.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, members: Vec<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            members,
        }
    }

    /// Generate a client-local group id (`grp-<millis>`).
    #[must_use]
    pub fn local_id() -> String {
        format!("grp-{}", Utc::now().timestamp_millis())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_wire_field_names() {
        let msg = ChatMessage::new("grp-bridge", "Responder-07", "road is clear");
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"groupId\":\"grp-bridge\""));
        assert!(json.contains("\"sender\":\"Responder-07\""));
        // RFC 3339 timestamp
        assert!(json.contains("\"timestamp\":\""));
    }

    #[test]
    fn test_message_roundtrip() {
        let msg = ChatMessage::new("grp-supply", "Logistics", "convoy moving");
        let json = serde_json::to_string(&msg).unwrap();
        let parsed: ChatMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, msg);
    }

    #[test]
    fn test_local_id_scheme() {
        let id = Group::local_id();
        assert!(id.starts_with("grp-"));
        assert!(id["grp-".len()..].chars().all(|c| c.is_ascii_digit()));
    }
}
