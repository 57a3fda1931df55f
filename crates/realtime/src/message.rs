//! Wire frames exchanged over a real-time connection.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Frames sent by clients.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Join { room: String },
    Leave { room: String },
}

/// Frames sent by the server.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Joined {
        room: String,
    },
    Left {
        room: String,
    },
    Error {
        #[serde(skip_serializing_if = "Option::is_none")]
        room: Option<String>,
        reason: String,
    },
    /// A notification delivered to a room.
    Event {
        room: String,
        event: String,
        data: serde_json::Value,
    },
}

impl ServerMessage {
    pub fn error(room: Option<String>, reason: impl Into<String>) -> Self {
        ServerMessage::Error {
            room,
            reason: reason.into(),
        }
    }

    /// Encodes the frame as JSON text.
    pub fn to_frame(&self) -> Result<Arc<str>, serde_json::Error> {
        serde_json::to_string(self).map(Arc::from)
    }
}
