use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::ClientId;

/// Control frames the client sends to the coordinator backend.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlFrame {
    Ping { timestamp: String },
    Subscribe { event_types: Vec<String> },
    Unsubscribe { event_types: Vec<String> },
}

impl ControlFrame {
    /// Keep-alive ping stamped with the current time (RFC 3339).
    pub fn ping_now() -> Self {
        Self::Ping {
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    pub fn to_json(&self) -> String {
        // A tagged enum of strings cannot fail to serialize.
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Inbound frames, classified by their `type` tag.
///
/// Event frames keep the full raw JSON so unknown event types and arbitrary
/// payload shapes survive verbatim to the dispatch layer.
#[derive(Clone, Debug, PartialEq)]
pub enum ServerFrame {
    /// Liveness reply to our ping. Swallowed, never dispatched.
    Pong,
    /// Server-reported error, carrying the full frame.
    Error(Value),
    /// Handshake acknowledgement carrying the server-assigned client ID.
    ConnectionEstablished {
        client_id: Option<ClientId>,
        raw: Value,
    },
    /// Any other typed frame: dispatched under its literal type name.
    Event { event_type: String, raw: Value },
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("frame has no string `type` field")]
    MissingType,
}

impl ServerFrame {
    pub fn parse(text: &str) -> Result<Self, FrameError> {
        let raw: Value = serde_json::from_str(text)?;
        let frame_type = raw
            .get("type")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .ok_or(FrameError::MissingType)?;

        Ok(match frame_type.as_str() {
            "pong" => Self::Pong,
            "error" => Self::Error(raw),
            "connection_established" => {
                let client_id = raw
                    .get("client_id")
                    .and_then(Value::as_str)
                    .map(ClientId::from_raw);
                Self::ConnectionEstablished { client_id, raw }
            }
            _ => Self::Event {
                event_type: frame_type,
                raw,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ping_serializes_with_type_tag() {
        let frame = ControlFrame::Ping {
            timestamp: "2026-08-23T12:00:00Z".into(),
        };
        let json: Value = serde_json::from_str(&frame.to_json()).unwrap();
        assert_eq!(json["type"], "ping");
        assert_eq!(json["timestamp"], "2026-08-23T12:00:00Z");
    }

    #[test]
    fn ping_now_is_rfc3339() {
        let ControlFrame::Ping { timestamp } = ControlFrame::ping_now() else {
            panic!("expected ping");
        };
        assert!(chrono::DateTime::parse_from_rfc3339(&timestamp).is_ok());
    }

    #[test]
    fn subscribe_carries_event_types() {
        let frame = ControlFrame::Subscribe {
            event_types: vec!["task_update".into(), "agent_status".into()],
        };
        let json: Value = serde_json::from_str(&frame.to_json()).unwrap();
        assert_eq!(json["type"], "subscribe");
        assert_eq!(json["event_types"], json!(["task_update", "agent_status"]));
    }

    #[test]
    fn unsubscribe_roundtrip() {
        let frame = ControlFrame::Unsubscribe {
            event_types: vec!["typing".into()],
        };
        let parsed: ControlFrame = serde_json::from_str(&frame.to_json()).unwrap();
        assert_eq!(parsed, frame);
    }

    #[test]
    fn parse_pong() {
        let frame = ServerFrame::parse(r#"{"type":"pong"}"#).unwrap();
        assert_eq!(frame, ServerFrame::Pong);
    }

    #[test]
    fn parse_error_keeps_full_frame() {
        let frame = ServerFrame::parse(r#"{"type":"error","error":"bad token"}"#).unwrap();
        let ServerFrame::Error(raw) = frame else {
            panic!("expected error frame");
        };
        assert_eq!(raw["error"], "bad token");
    }

    #[test]
    fn parse_connection_established_extracts_client_id() {
        let frame =
            ServerFrame::parse(r#"{"type":"connection_established","client_id":"client-7"}"#)
                .unwrap();
        let ServerFrame::ConnectionEstablished { client_id, raw } = frame else {
            panic!("expected handshake frame");
        };
        assert_eq!(client_id.unwrap().as_str(), "client-7");
        assert_eq!(raw["type"], "connection_established");
    }

    #[test]
    fn parse_connection_established_without_client_id() {
        let frame = ServerFrame::parse(r#"{"type":"connection_established"}"#).unwrap();
        let ServerFrame::ConnectionEstablished { client_id, .. } = frame else {
            panic!("expected handshake frame");
        };
        assert!(client_id.is_none());
    }

    #[test]
    fn parse_event_preserves_unknown_types() {
        let frame =
            ServerFrame::parse(r#"{"type":"something_new","data":{"k":1}}"#).unwrap();
        let ServerFrame::Event { event_type, raw } = frame else {
            panic!("expected event frame");
        };
        assert_eq!(event_type, "something_new");
        assert_eq!(raw["data"]["k"], 1);
    }

    #[test]
    fn parse_rejects_invalid_json() {
        assert!(matches!(
            ServerFrame::parse("not json"),
            Err(FrameError::Json(_))
        ));
    }

    #[test]
    fn parse_rejects_missing_type() {
        assert!(matches!(
            ServerFrame::parse(r#"{"data":1}"#),
            Err(FrameError::MissingType)
        ));
        // A non-string type tag is just as malformed.
        assert!(matches!(
            ServerFrame::parse(r#"{"type":7}"#),
            Err(FrameError::MissingType)
        ));
    }
}
