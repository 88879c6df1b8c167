//! Bot API wire types
//!
//! Only the fields the bot reads are modelled; serde ignores the rest.

use crate::db::{ChatId, ProofKind, UserId};
use crate::workflow::event::{Actor, ButtonPress, FileRef, SourceMessage};
use crate::workflow::{Inbound, InboundKind, Markup};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Envelope of every Bot API response
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TgUser {
    pub id: UserId,
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Chat {
    pub id: ChatId,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PhotoSize {
    pub file_id: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Document {
    pub file_id: String,
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Message {
    pub message_id: i64,
    pub from: Option<TgUser>,
    pub chat: Chat,
    pub text: Option<String>,
    pub caption: Option<String>,
    /// Sizes of one photo, smallest first
    pub photo: Option<Vec<PhotoSize>>,
    pub document: Option<Document>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: TgUser,
    pub message: Option<Message>,
    pub data: Option<String>,
}

/// Result of `getFile`
#[derive(Debug, Deserialize)]
pub struct FileInfo {
    pub file_path: Option<String>,
}

/// Result of `sendMessage`
#[derive(Debug, Deserialize)]
pub struct SentMessage {
    pub message_id: i64,
}

impl Update {
    /// Translate into the transport-neutral event. Updates without a sender
    /// (channel posts, service messages) yield `None`.
    pub fn into_inbound(self) -> Option<Inbound> {
        let event_id = Some(self.update_id.to_string());

        if let Some(query) = self.callback_query {
            let chat_id = query
                .message
                .as_ref()
                .map_or(query.from.id, |m| m.chat.id);
            let source = query.message.map(|m| SourceMessage {
                chat_id: m.chat.id,
                message_id: m.message_id,
                text: m.text.or(m.caption).unwrap_or_default(),
            });
            return Some(Inbound {
                event_id,
                actor: actor(query.from),
                chat_id,
                kind: InboundKind::Button(ButtonPress {
                    callback_id: query.id,
                    payload: query.data.unwrap_or_default(),
                    source,
                }),
            });
        }

        let message = self.message?;
        let from = message.from?;
        let kind = if let Some(text) = message.text {
            InboundKind::Text { text }
        } else if let Some(largest) = message.photo.and_then(|sizes| sizes.into_iter().last()) {
            InboundKind::File(FileRef {
                file_id: largest.file_id,
                kind: ProofKind::Photo,
                mime_type: None,
            })
        } else if let Some(doc) = message.document {
            InboundKind::File(FileRef {
                file_id: doc.file_id,
                kind: ProofKind::Document,
                mime_type: doc.mime_type,
            })
        } else {
            InboundKind::Unsupported
        };

        Some(Inbound {
            event_id,
            actor: actor(from),
            chat_id: message.chat.id,
            kind,
        })
    }
}

fn actor(user: TgUser) -> Actor {
    Actor {
        id: user.id,
        username: user.username,
    }
}

/// `reply_markup` JSON for a message
pub fn reply_markup(markup: &Markup) -> Value {
    match markup {
        Markup::Inline(rows) => {
            let rows: Vec<Vec<Value>> = rows
                .iter()
                .map(|row| {
                    row.iter()
                        .map(|b| json!({ "text": b.label, "callback_data": b.action.to_string() }))
                        .collect()
                })
                .collect();
            json!({ "inline_keyboard": rows })
        }
        Markup::Dashboard(role) => {
            let rows: Vec<Vec<Value>> = Markup::dashboard_rows(*role)
                .into_iter()
                .map(|row| row.into_iter().map(|label| json!({ "text": label })).collect())
                .collect();
            json!({ "keyboard": rows, "resize_keyboard": true })
        }
    }
}
