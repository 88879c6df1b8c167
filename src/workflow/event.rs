//! Inbound events
//!
//! Transport-neutral form of one delivery: a text message, a button press or
//! a file upload. Transport adapters build these; the core never sees wire
//! types.

use crate::db::{ChatId, ProofKind, UserId};
use serde::{Deserialize, Serialize};

/// The person who caused the event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: UserId,
    pub username: Option<String>,
}

/// The message a pressed button is attached to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceMessage {
    pub chat_id: ChatId,
    pub message_id: i64,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ButtonPress {
    /// Transport handle used to acknowledge the press
    pub callback_id: String,
    pub payload: String,
    pub source: Option<SourceMessage>,
}

/// An uploaded file, still held by the transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRef {
    pub file_id: String,
    pub kind: ProofKind,
    pub mime_type: Option<String>,
}

impl FileRef {
    pub fn mime(&self) -> &str {
        match (self.kind, self.mime_type.as_deref()) {
            (ProofKind::Photo, _) => "image/jpeg",
            (ProofKind::Document, Some(mime)) => mime,
            (ProofKind::Document, None) => "application/octet-stream",
        }
    }

    /// File extension used for the stored blob
    pub fn extension(&self) -> &'static str {
        match self.kind {
            ProofKind::Photo => ".jpg",
            ProofKind::Document if self.mime().contains("pdf") => ".pdf",
            ProofKind::Document => ".dat",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundKind {
    Text { text: String },
    Button(ButtonPress),
    File(FileRef),
    /// Stickers, locations and the like
    Unsupported,
}

/// One inbound event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inbound {
    /// Transport-provided idempotency key
    pub event_id: Option<String>,
    pub actor: Actor,
    /// Chat the event arrived in; replies go here
    pub chat_id: ChatId,
    pub kind: InboundKind,
}

/// Fieldless event discriminant, the column key of the route table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Text,
    Button,
    File,
    Unsupported,
}

impl Inbound {
    pub fn kind(&self) -> EventKind {
        match self.kind {
            InboundKind::Text { .. } => EventKind::Text,
            InboundKind::Button(_) => EventKind::Button,
            InboundKind::File(_) => EventKind::File,
            InboundKind::Unsupported => EventKind::Unsupported,
        }
    }

    pub fn text(&self) -> Option<&str> {
        match &self.kind {
            InboundKind::Text { text } => Some(text),
            _ => None,
        }
    }

    pub fn button(&self) -> Option<&ButtonPress> {
        match &self.kind {
            InboundKind::Button(press) => Some(press),
            _ => None,
        }
    }

    pub fn file(&self) -> Option<&FileRef> {
        match &self.kind {
            InboundKind::File(file) => Some(file),
            _ => None,
        }
    }
}
