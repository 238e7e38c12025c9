//! Socket wire format.
//!
//! Two payload shapes travel on the same socket: plain chat messages and
//! control frames that mutate group state. The wire itself does not
//! distinguish them — a consumer discriminates on the presence of a `type`
//! field.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::ChatMessage;

/// A control payload: changes registry/membership state instead of carrying
/// a displayable message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ControlFrame {
    /// Announce a newly created group and its member list.
    ///
    /// There is no acknowledgement handshake: the sender assumes creation
    /// succeeded the instant the frame leaves the socket.
    #[serde(rename_all = "camelCase")]
    JoinGroup {
        /// Id of the announced group
        group_id: String,
        /// Full member list, creator included
        members: Vec<String>,
    },
}

/// Everything that can appear on the socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A displayable chat message
    Chat(ChatMessage),
    /// A control payload
    Control(ControlFrame),
}

impl Frame {
    /// Parse a raw socket payload.
    ///
    /// Malformed payloads are a [`Error::Protocol`]; callers log and discard
    /// them without disturbing the receive loop.
    pub fn parse(raw: &str) -> Result<Self> {
        let value: serde_json::Value =
            serde_json::from_str(raw).map_err(|e| Error::Protocol(format!("invalid JSON: {e}")))?;

        if value.get("type").is_some() {
            let control: ControlFrame = serde_json::from_value(value)
                .map_err(|e| Error::Protocol(format!("bad control frame: {e}")))?;
            Ok(Self::Control(control))
        } else {
            let chat: ChatMessage = serde_json::from_value(value)
                .map_err(|e| Error::Protocol(format!("bad chat frame: {e}")))?;
            Ok(Self::Chat(chat))
        }
    }

    /// Serialize for transmission.
    pub fn encode(&self) -> Result<String> {
        let encoded = match self {
            Self::Chat(msg) => serde_json::to_string(msg),
            Self::Control(ctl) => serde_json::to_string(ctl),
        };
        encoded.map_err(|e| Error::Internal(format!("frame encode failed: {e}")))
    }

    /// Shorthand for a `joinGroup` announcement.
    #[must_use]
    pub fn join_group(group_id: impl Into<String>, members: Vec<String>) -> Self {
        Self::Control(ControlFrame::JoinGroup {
            group_id: group_id.into(),
            members,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_frame_parse() {
        let raw = r#"{"sender":"cmdr-1","text":"hold position","groupId":"grp-bridge","timestamp":"2026-08-07T12:00:00Z"}"#;
        match Frame::parse(raw).unwrap() {
            Frame::Chat(msg) => {
                assert_eq!(msg.sender, "cmdr-1");
                assert_eq!(msg.group_id, "grp-bridge");
            }
            other => panic!("expected chat frame, got: {other:?}"),
        }
    }

    #[test]
    fn test_control_frame_discriminated_by_type_field() {
        let raw = r#"{"type":"joinGroup","groupId":"grp-17","members":["cmdr-1","resp-2"]}"#;
        match Frame::parse(raw).unwrap() {
            Frame::Control(ControlFrame::JoinGroup { group_id, members }) => {
                assert_eq!(group_id, "grp-17");
                assert_eq!(members, vec!["cmdr-1", "resp-2"]);
            }
            other => panic!("expected control frame, got: {other:?}"),
        }
    }

    #[test]
    fn test_join_group_wire_shape() {
        let frame = Frame::join_group("grp-42", vec!["cmdr-1".to_string()]);
        let json = frame.encode().unwrap();
        assert!(json.contains("\"type\":\"joinGroup\""));
        assert!(json.contains("\"groupId\":\"grp-42\""));
        assert!(json.contains("\"members\":[\"cmdr-1\"]"));
    }

    #[test]
    fn test_malformed_json_is_protocol_error() {
        let err = Frame::parse("{not json").unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }

    #[test]
    fn test_missing_fields_is_protocol_error() {
        // No `type`, so this must parse as a chat frame — and fail cleanly.
        let err = Frame::parse(r#"{"sender":"x"}"#).unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }

    #[test]
    fn test_unknown_control_type_is_protocol_error() {
        let err = Frame::parse(r#"{"type":"leaveGroup","groupId":"g"}"#).unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }

    #[test]
    fn test_chat_roundtrip_through_encode() {
        let msg = ChatMessage::new("grp-supply", "resp-3", "fuel at 40%");
        let encoded = Frame::Chat(msg.clone()).encode().unwrap();
        match Frame::parse(&encoded).unwrap() {
            Frame::Chat(parsed) => assert_eq!(parsed, msg),
            other => panic!("expected chat frame, got: {other:?}"),
        }
    }
}
