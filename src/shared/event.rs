/**
 * Live Session Protocol
 *
 * Wire types for the peer-learning socket. Every frame is a JSON text message
 * of the form `{"event": <name>, "data": {...}}`. Client frames may carry an
 * `ack` id; the server answers those with an `ack` event holding the same id
 * and the operation result.
 */
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::shared::error::SharedError;

/// Raw frame as received from a client
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ClientFrame {
    pub event: String,
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub ack: Option<u64>,
}

impl ClientFrame {
    pub fn parse(text: &str) -> Result<Self, SharedError> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Accepts ids sent either as strings or as numbers.
fn lenient_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) if !s.is_empty() => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct JoinSession {
    #[serde(default, deserialize_with = "lenient_id")]
    pub session_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_id")]
    pub user_id: Option<String>,
    #[serde(default)]
    pub user_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct SendMessage {
    #[serde(default, deserialize_with = "lenient_id")]
    pub session_id: Option<String>,
    #[serde(default)]
    pub message: Value,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct WhiteboardUpdate {
    #[serde(default, deserialize_with = "lenient_id")]
    pub session_id: Option<String>,
    #[serde(default)]
    pub elements: Value,
    #[serde(default, alias = "appState")]
    pub app_state: Value,
    #[serde(default, deserialize_with = "lenient_id")]
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct WebrtcSignal {
    #[serde(default, deserialize_with = "lenient_id")]
    pub session_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_id")]
    pub target_user_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_id")]
    pub from_user_id: Option<String>,
    #[serde(default)]
    pub signal: Value,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct WebrtcLeave {
    #[serde(default, deserialize_with = "lenient_id")]
    pub session_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_id")]
    pub user_id: Option<String>,
}

/// Decoded client event
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    JoinSession(JoinSession),
    SendMessage(SendMessage),
    WhiteboardUpdate(WhiteboardUpdate),
    WebrtcJoin(JoinSession),
    WebrtcSignal(WebrtcSignal),
    WebrtcLeave(WebrtcLeave),
}

impl ClientEvent {
    pub fn from_frame(frame: &ClientFrame) -> Result<Self, SharedError> {
        let data = if frame.data.is_null() {
            Value::Object(Default::default())
        } else {
            frame.data.clone()
        };
        let event = match frame.event.as_str() {
            "join_session" => Self::JoinSession(serde_json::from_value(data)?),
            "send_message" => Self::SendMessage(serde_json::from_value(data)?),
            "whiteboard_update" => Self::WhiteboardUpdate(serde_json::from_value(data)?),
            "webrtc_join" => Self::WebrtcJoin(serde_json::from_value(data)?),
            "webrtc_signal" => Self::WebrtcSignal(serde_json::from_value(data)?),
            "webrtc_leave" => Self::WebrtcLeave(serde_json::from_value(data)?),
            other => {
                return Err(SharedError::validation("event", format!("Unknown event '{}'", other)))
            }
        };
        Ok(event)
    }
}

/// Participant entry returned in join acknowledgements
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ParticipantInfo {
    pub user_id: String,
    pub user_name: String,
}

/// Events pushed from the server to a connection
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    Connected {
        sid: String,
    },
    UserJoined {
        user_id: String,
        user_name: String,
        session_id: String,
    },
    UserLeft {
        user_id: String,
        session_id: String,
    },
    NewMessage(Value),
    WhiteboardChanged {
        elements: Value,
        app_state: Value,
        user_id: Option<String>,
    },
    PeerJoined {
        user_id: String,
        user_name: String,
    },
    PeerLeft {
        user_id: String,
    },
    WebrtcSignal {
        from_user_id: Option<String>,
        signal: Value,
    },
    SessionStatus {
        session_id: String,
        status: String,
    },
    Ack {
        id: u64,
        result: Value,
    },
    Error {
        error: String,
    },
}

impl ServerEvent {
    pub fn ack(id: u64, result: impl Serialize) -> Self {
        let result = serde_json::to_value(result)
            .unwrap_or_else(|e| serde_json::json!({ "error": e.to_string() }));
        Self::Ack { id, result }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error { error: message.into() }
    }

    pub fn to_json(&self) -> Result<String, SharedError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Acknowledgement for `join_session`
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct JoinAck {
    pub success: bool,
    pub participants: Vec<ParticipantInfo>,
    pub peers: Vec<String>,
}

/// Acknowledgement for `webrtc_join`
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PeerJoinAck {
    pub success: bool,
    pub peers: Vec<ParticipantInfo>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SuccessAck {
    pub success: bool,
}

impl SuccessAck {
    pub fn ok() -> Self {
        Self { success: true }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ErrorAck {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_parse_join_frame() {
        let frame = ClientFrame::parse(
            r#"{"event":"join_session","data":{"session_id":"abc","user_id":7},"ack":3}"#,
        )
        .unwrap();
        assert_eq!(frame.ack, Some(3));
        let event = ClientEvent::from_frame(&frame).unwrap();
        assert_eq!(
            event,
            ClientEvent::JoinSession(JoinSession {
                session_id: Some("abc".to_string()),
                user_id: Some("7".to_string()),
                user_name: None,
            })
        );
    }

    #[test]
    fn test_missing_fields_are_none() {
        let frame = ClientFrame::parse(r#"{"event":"webrtc_signal"}"#).unwrap();
        let event = ClientEvent::from_frame(&frame).unwrap();
        assert_matches!(event, ClientEvent::WebrtcSignal(WebrtcSignal { session_id: None, target_user_id: None, .. }));
    }

    #[test]
    fn test_empty_id_is_none() {
        let frame = ClientFrame::parse(r#"{"event":"send_message","data":{"session_id":""}}"#).unwrap();
        assert_matches!(
            ClientEvent::from_frame(&frame).unwrap(),
            ClientEvent::SendMessage(SendMessage { session_id: None, .. })
        );
    }

    #[test]
    fn test_unknown_event() {
        let frame = ClientFrame::parse(r#"{"event":"dance","data":{}}"#).unwrap();
        assert_matches!(ClientEvent::from_frame(&frame), Err(SharedError::ValidationError { .. }));
    }

    #[test]
    fn test_malformed_frame() {
        assert!(ClientFrame::parse("not json").is_err());
    }

    #[test]
    fn test_whiteboard_app_state_alias() {
        let frame = ClientFrame::parse(
            r#"{"event":"whiteboard_update","data":{"session_id":"s","elements":[1],"appState":{"zoom":1}}}"#,
        )
        .unwrap();
        match ClientEvent::from_frame(&frame).unwrap() {
            ClientEvent::WhiteboardUpdate(update) => assert_eq!(update.app_state, json!({"zoom": 1})),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_server_event_wire_format() {
        let event = ServerEvent::UserJoined {
            user_id: "u1".to_string(),
            user_name: "Ada".to_string(),
            session_id: "s1".to_string(),
        };
        let value: Value = serde_json::from_str(&event.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({"event": "user_joined", "data": {"user_id": "u1", "user_name": "Ada", "session_id": "s1"}})
        );

        let message = ServerEvent::NewMessage(json!({"text": "hi"}));
        let value: Value = serde_json::from_str(&message.to_json().unwrap()).unwrap();
        assert_eq!(value, json!({"event": "new_message", "data": {"text": "hi"}}));
    }

    #[test]
    fn test_ack_wire_format() {
        let ack = ServerEvent::ack(9, SuccessAck::ok());
        let value: Value = serde_json::from_str(&ack.to_json().unwrap()).unwrap();
        assert_eq!(value, json!({"event": "ack", "data": {"id": 9, "result": {"success": true}}}));
    }
}
