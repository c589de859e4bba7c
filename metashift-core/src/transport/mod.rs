//! Messaging boundary: how requests arrive and how replies leave.
//!
//! The pipeline only sees [`ChatTransport`] and [`UpdateSource`]; the Telegram
//! Bot API client and its long-poll source are one implementation of each.

mod error;
mod long_poll;
mod telegram;

use std::path::Path;

use async_trait::async_trait;

use crate::request::InboundRequest;

pub use error::{TransportError, TransportResult};
pub use long_poll::LongPollSource;
pub use telegram::{
    ApiResponse, BotUser, TelegramClient, TgChat, TgDocument, TgFile, TgMessage, Update,
};

/// Outbound half of the messaging protocol. Every call reports its outcome.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Resolves an opaque file reference to a direct-download URL.
    async fn resolve_file_url(&self, file_ref: &str) -> TransportResult<String>;

    async fn send_text(&self, chat_id: i64, text: &str) -> TransportResult<()>;

    async fn send_document(&self, chat_id: i64, path: &Path, file_name: &str)
        -> TransportResult<()>;
}

/// Inbound half: yields batches of events, however they are received.
#[async_trait]
pub trait UpdateSource: Send {
    async fn next_events(&mut self) -> TransportResult<Vec<InboundEvent>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRef {
    pub file_ref: String,
    pub mime_type: Option<String>,
    pub file_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    pub chat_id: i64,
    pub message_id: i64,
    pub text: Option<String>,
    pub document: Option<DocumentRef>,
}

impl InboundEvent {
    pub fn into_request(self) -> Option<InboundRequest> {
        let document = self.document?;
        Some(InboundRequest {
            chat_id: self.chat_id,
            message_id: self.message_id,
            mime_type: document.mime_type,
            file_ref: document.file_ref,
            file_name: document.file_name,
        })
    }

    /// Bot command in the text, without the leading slash or `@botname` suffix.
    pub fn command(&self) -> Option<&str> {
        let text = self.text.as_deref()?.trim_start();
        let word = text.strip_prefix('/')?.split_whitespace().next()?;
        let name = word.split('@').next().unwrap_or(word);
        (!name.is_empty()).then_some(name)
    }
}
