use serde::{Deserialize, Serialize};

/// Events sent FROM a client TO the relay over WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum ClientEvent {
    /// Bind this connection to a user identity. A later register for the
    /// same user silently replaces the earlier connection.
    #[serde(rename_all = "camelCase")]
    Register { user_id: i64 },

    /// Push a chat message to the receiver if they are online. This is the
    /// client-initiated mirror of the HTTP send; the relay does not persist it.
    #[serde(rename_all = "camelCase")]
    SendMessage {
        sender_id: i64,
        receiver_id: i64,
        message: String,
    },

    /// Typing indicator for the receiver.
    #[serde(rename_all = "camelCase")]
    Typing { sender_id: i64, receiver_id: i64 },
}

/// Events sent FROM the relay TO a client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    #[serde(rename_all = "camelCase")]
    ReceiveMessage {
        sender_id: i64,
        message: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    #[serde(rename_all = "camelCase")]
    UserTyping { sender_id: i64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_event_wire_format() {
        let event: ClientEvent =
            serde_json::from_str(r#"{"type":"register","data":{"userId":7}}"#).unwrap();
        match event {
            ClientEvent::Register { user_id } => assert_eq!(user_id, 7),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn server_event_uses_camel_case_fields() {
        let event = ServerEvent::UserTyping { sender_id: 3 };
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"{"type":"userTyping","data":{"senderId":3}}"#);
    }
}
