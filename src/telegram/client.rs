//! Bot API client

use super::types::{reply_markup, ApiResponse, FileInfo, SentMessage, Update};
use crate::db::{ChatId, ProofFile, ProofKind};
use crate::runtime::{ChatTransport, TransportError};
use crate::workflow::Markup;
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::time::Duration;

/// Telegram Bot API client
pub struct TelegramClient {
    client: Client,
    /// `{api}/bot{token}`
    method_base: String,
    /// `{api}/file/bot{token}`
    file_base: String,
}

impl TelegramClient {
    pub fn new(api_url: &str, token: &str) -> Result<Self, TransportError> {
        // Long enough for a 30 s long poll plus slack
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| TransportError::Unavailable(format!("HTTP client: {e}")))?;
        let api = api_url.trim_end_matches('/');
        Ok(Self {
            client,
            method_base: format!("{api}/bot{token}"),
            file_base: format!("{api}/file/bot{token}"),
        })
    }

    /// Long-poll for updates after `offset`
    pub async fn get_updates(
        &self,
        offset: i64,
        timeout_secs: u64,
    ) -> Result<Vec<Update>, TransportError> {
        self.call(
            "getUpdates",
            &json!({
                "offset": offset,
                "timeout": timeout_secs,
                "allowed_updates": ["message", "callback_query"],
            }),
        )
        .await
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: &Value,
    ) -> Result<T, TransportError> {
        let response = self
            .client
            .post(format!("{}/{method}", self.method_base))
            .json(body)
            .send()
            .await
            .map_err(|e| TransportError::Unavailable(format!("{method}: {e}")))?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            TransportError::Unavailable(format!("{method}: failed to read response: {e}"))
        })?;

        let parsed: ApiResponse<T> = serde_json::from_str(&text).map_err(|e| {
            classify(status, format!("{method}: unparseable response ({e}): {text}"))
        })?;

        match parsed {
            ApiResponse {
                ok: true,
                result: Some(result),
                ..
            } => Ok(result),
            ApiResponse { description, .. } => Err(classify(
                status,
                format!("{method}: {}", description.unwrap_or_else(|| status.to_string())),
            )),
        }
    }
}

fn classify(status: reqwest::StatusCode, message: String) -> TransportError {
    match status.as_u16() {
        429 | 500..=599 => TransportError::Unavailable(message),
        _ => TransportError::Rejected(message),
    }
}

#[async_trait]
impl ChatTransport for TelegramClient {
    async fn send_message(
        &self,
        chat: ChatId,
        text: &str,
        markup: Option<&Markup>,
    ) -> Result<i64, TransportError> {
        let mut body = json!({ "chat_id": chat, "text": text });
        if let Some(markup) = markup {
            body["reply_markup"] = reply_markup(markup);
        }
        let sent: SentMessage = self.call("sendMessage", &body).await?;
        Ok(sent.message_id)
    }

    async fn edit_message(
        &self,
        chat: ChatId,
        message_id: i64,
        text: &str,
        markup: Option<&Markup>,
    ) -> Result<(), TransportError> {
        let mut body = json!({ "chat_id": chat, "message_id": message_id, "text": text });
        // Edited messages only take inline keyboards
        if let Some(markup @ Markup::Inline(_)) = markup {
            body["reply_markup"] = reply_markup(markup);
        }
        let _: Value = self.call("editMessageText", &body).await?;
        Ok(())
    }

    async fn send_media(&self, chat: ChatId, file: &ProofFile) -> Result<(), TransportError> {
        let (method, field) = match file.kind {
            ProofKind::Photo => ("sendPhoto", "photo"),
            ProofKind::Document => ("sendDocument", "document"),
        };
        let mut body = json!({ "chat_id": chat });
        body[field] = json!(file.url);
        let _: Value = self.call(method, &body).await?;
        Ok(())
    }

    async fn answer_button(
        &self,
        callback_id: &str,
        text: Option<&str>,
    ) -> Result<(), TransportError> {
        let mut body = json!({ "callback_query_id": callback_id });
        if let Some(text) = text {
            body["text"] = json!(text);
        }
        let _: bool = self.call("answerCallbackQuery", &body).await?;
        Ok(())
    }

    async fn fetch_file(&self, file_id: &str) -> Result<Vec<u8>, TransportError> {
        let info: FileInfo = self.call("getFile", &json!({ "file_id": file_id })).await?;
        let path = info
            .file_path
            .ok_or_else(|| TransportError::Rejected(format!("file {file_id} has no path")))?;

        let response = self
            .client
            .get(format!("{}/{path}", self.file_base))
            .send()
            .await
            .map_err(|e| TransportError::Unavailable(format!("download {file_id}: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(classify(status, format!("download {file_id}: HTTP {status}")));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| TransportError::Unavailable(format!("download {file_id}: {e}")))?;
        Ok(bytes.to_vec())
    }
}
