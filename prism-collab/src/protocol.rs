//! Wire protocol for presence and content-sync events.
//!
//! Every event travels as a [`CollabMessage`] envelope (bincode-encoded):
//! ```text
//! ┌────────────┬───────────┬──────────────────────────────┐
//! │ event_type │ sender_id │ payload                      │
//! │ 1 byte     │ 16 bytes  │ variable (bincode, per type) │
//! └────────────┴───────────┴──────────────────────────────┘
//! ```
//!
//! Payload shapes:
//! - `JOIN` / `HEARTBEAT`: full [`Collaborator`]
//! - `CURSOR_MOVE`: [`Collaborator`] with `file` and `cursor_position` set
//! - `CODE_UPDATE`: [`CodeUpdate`]
//! - `LEAVE`: [`LeavePayload`]

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Event discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum EventType {
    /// Explicit entry into the session
    Join = 1,
    /// Explicit exit
    Leave = 2,
    /// Periodic liveness signal
    Heartbeat = 3,
    /// Region or full-document content change
    CodeUpdate = 4,
    /// Cursor moved within a virtual file
    CursorMove = 5,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Join => "JOIN",
            EventType::Leave => "LEAVE",
            EventType::Heartbeat => "HEARTBEAT",
            EventType::CodeUpdate => "CODE_UPDATE",
            EventType::CursorMove => "CURSOR_MOVE",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 1-based cursor position inside a virtual file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CursorPosition {
    pub line: u32,
    pub column: u32,
}

impl CursorPosition {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

/// A participant as seen by other contexts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collaborator {
    pub id: Uuid,
    pub name: String,
    /// CSS color string, e.g. `#60a5fa`.
    pub color: String,
    pub cursor_position: Option<CursorPosition>,
    /// Virtual file the cursor is in.
    pub file: Option<String>,
    /// Milliseconds since the Unix epoch.
    pub last_active: u64,
}

/// Content change for one virtual file of one project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeUpdate {
    pub project_id: Uuid,
    pub file_name: String,
    pub new_code: String,
}

/// Payload of a `LEAVE` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeavePayload {
    pub id: Uuid,
}

/// Decoded event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollabEvent {
    Join(Collaborator),
    Leave { id: Uuid },
    Heartbeat(Collaborator),
    CursorMove(Collaborator),
    CodeUpdate(CodeUpdate),
}

impl CollabEvent {
    pub fn event_type(&self) -> EventType {
        match self {
            CollabEvent::Join(_) => EventType::Join,
            CollabEvent::Leave { .. } => EventType::Leave,
            CollabEvent::Heartbeat(_) => EventType::Heartbeat,
            CollabEvent::CursorMove(_) => EventType::CursorMove,
            CollabEvent::CodeUpdate(_) => EventType::CodeUpdate,
        }
    }
}

/// An event together with the context that sent it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Incoming {
    pub sender_id: Uuid,
    pub event: CollabEvent,
}

/// Envelope as it travels over a hub.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollabMessage {
    pub event_type: EventType,
    pub sender_id: Uuid,
    pub payload: Vec<u8>,
}

impl CollabMessage {
    /// Wrap an event, encoding its payload.
    pub fn new(sender_id: Uuid, event: &CollabEvent) -> Result<Self, ProtocolError> {
        let payload = match event {
            CollabEvent::Join(info)
            | CollabEvent::Heartbeat(info)
            | CollabEvent::CursorMove(info) => encode_payload(info)?,
            CollabEvent::Leave { id } => encode_payload(&LeavePayload { id: *id })?,
            CollabEvent::CodeUpdate(update) => encode_payload(update)?,
        };
        Ok(Self {
            event_type: event.event_type(),
            sender_id,
            payload,
        })
    }

    /// Serialize to binary wire format.
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        bincode::serde::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| ProtocolError::SerializationError(e.to_string()))
    }

    /// Deserialize from binary wire format.
    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let (msg, _) = bincode::serde::decode_from_slice(bytes, bincode::config::standard())
            .map_err(|e| ProtocolError::DeserializationError(e.to_string()))?;
        Ok(msg)
    }

    /// Parse the payload according to `event_type`.
    pub fn event(&self) -> Result<CollabEvent, ProtocolError> {
        Ok(match self.event_type {
            EventType::Join => CollabEvent::Join(decode_payload(&self.payload)?),
            EventType::Heartbeat => CollabEvent::Heartbeat(decode_payload(&self.payload)?),
            EventType::CursorMove => CollabEvent::CursorMove(decode_payload(&self.payload)?),
            EventType::CodeUpdate => CollabEvent::CodeUpdate(decode_payload(&self.payload)?),
            EventType::Leave => {
                let LeavePayload { id } = decode_payload(&self.payload)?;
                CollabEvent::Leave { id }
            }
        })
    }

    /// Parse into an [`Incoming`] carrying the sender.
    pub fn incoming(&self) -> Result<Incoming, ProtocolError> {
        Ok(Incoming {
            sender_id: self.sender_id,
            event: self.event()?,
        })
    }
}

fn encode_payload<T: Serialize>(value: &T) -> Result<Vec<u8>, ProtocolError> {
    bincode::serde::encode_to_vec(value, bincode::config::standard())
        .map_err(|e| ProtocolError::SerializationError(e.to_string()))
}

fn decode_payload<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T, ProtocolError> {
    let (value, _) = bincode::serde::decode_from_slice(bytes, bincode::config::standard())
        .map_err(|e| ProtocolError::DeserializationError(e.to_string()))?;
    Ok(value)
}

/// Protocol errors.
#[derive(Debug, Clone)]
pub enum ProtocolError {
    SerializationError(String),
    DeserializationError(String),
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SerializationError(e) => write!(f, "Serialization error: {e}"),
            Self::DeserializationError(e) => write!(f, "Deserialization error: {e}"),
        }
    }
}

impl std::error::Error for ProtocolError {}
