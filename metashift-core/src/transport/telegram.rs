use std::fmt;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::debug;

use super::error::{TransportError, TransportResult};
use super::{ChatTransport, DocumentRef, InboundEvent};

/// Envelope every Bot API method answers with.
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    pub description: Option<String>,
    pub error_code: Option<i64>,
}

impl<T> ApiResponse<T> {
    pub fn into_result(self) -> TransportResult<T> {
        match (self.ok, self.result) {
            (true, Some(result)) => Ok(result),
            (true, None) => Err(TransportError::Decode("ok response without result".into())),
            (false, _) => Err(TransportError::Api {
                code: self.error_code,
                description: self
                    .description
                    .unwrap_or_else(|| "no description".to_string()),
            }),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BotUser {
    pub id: i64,
    pub username: Option<String>,
    pub first_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<TgMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TgMessage {
    pub message_id: i64,
    pub chat: TgChat,
    pub text: Option<String>,
    pub document: Option<TgDocument>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TgChat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TgDocument {
    pub file_id: String,
    pub file_name: Option<String>,
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TgFile {
    pub file_id: String,
    pub file_path: Option<String>,
}

impl From<TgMessage> for InboundEvent {
    fn from(message: TgMessage) -> Self {
        InboundEvent {
            chat_id: message.chat.id,
            message_id: message.message_id,
            text: message.text,
            document: message.document.map(|document| DocumentRef {
                file_ref: document.file_id,
                mime_type: document.mime_type,
                file_name: document.file_name,
            }),
        }
    }
}

#[derive(Serialize)]
struct GetUpdates<'a> {
    offset: i64,
    timeout: u64,
    allowed_updates: &'a [&'a str],
}

#[derive(Serialize)]
struct GetFile<'a> {
    file_id: &'a str,
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: i64,
    text: &'a str,
}

/// Minimal Bot API client over reqwest.
#[derive(Clone)]
pub struct TelegramClient {
    http_client: Client,
    api_base: String,
    token: String,
    request_timeout: Duration,
}

impl fmt::Debug for TelegramClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramClient")
            .field("api_base", &self.api_base)
            .field("token", &"<redacted>")
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl TelegramClient {
    pub fn new(
        token: impl Into<String>,
        api_base: impl Into<String>,
        request_timeout: Duration,
    ) -> TransportResult<Self> {
        let http_client = Client::builder()
            .user_agent("metashift/0.1")
            .build()
            .map_err(|err| TransportError::Client(err.to_string()))?;
        Ok(Self {
            http_client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            token: token.into(),
            request_timeout,
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.token, method)
    }

    pub fn file_url(&self, file_path: &str) -> String {
        format!(
            "{}/file/bot{}/{}",
            self.api_base,
            self.token,
            file_path.trim_start_matches('/')
        )
    }

    async fn call<P, T>(&self, method: &str, payload: &P) -> TransportResult<T>
    where
        P: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .http_client
            .post(self.method_url(method))
            .timeout(self.request_timeout)
            .json(payload)
            .send()
            .await?;
        let envelope: ApiResponse<T> = response.json().await?;
        envelope.into_result()
    }

    /// Authenticates the token; used once at startup.
    pub async fn get_me(&self) -> TransportResult<BotUser> {
        self.call("getMe", &serde_json::json!({})).await
    }

    pub async fn get_updates(
        &self,
        offset: i64,
        poll_timeout: Duration,
    ) -> TransportResult<Vec<Update>> {
        let payload = GetUpdates {
            offset,
            timeout: poll_timeout.as_secs(),
            allowed_updates: &["message"],
        };
        self.call("getUpdates", &payload).await
    }

    pub async fn get_file(&self, file_id: &str) -> TransportResult<TgFile> {
        self.call("getFile", &GetFile { file_id }).await
    }
}

#[async_trait]
impl ChatTransport for TelegramClient {
    async fn resolve_file_url(&self, file_ref: &str) -> TransportResult<String> {
        let file = self.get_file(file_ref).await?;
        let file_path = file.file_path.ok_or_else(|| TransportError::Api {
            code: None,
            description: format!("file {} has no downloadable path", file.file_id),
        })?;
        Ok(self.file_url(&file_path))
    }

    async fn send_text(&self, chat_id: i64, text: &str) -> TransportResult<()> {
        let _: serde_json::Value = self
            .call("sendMessage", &SendMessage { chat_id, text })
            .await?;
        Ok(())
    }

    async fn send_document(
        &self,
        chat_id: i64,
        path: &Path,
        file_name: &str,
    ) -> TransportResult<()> {
        let bytes = fs::read(path).await.map_err(|source| TransportError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(chat_id, size = bytes.len(), "uploading document");
        let part = Part::bytes(bytes).file_name(file_name.to_string());
        let form = Form::new()
            .text("chat_id", chat_id.to_string())
            .part("document", part);
        // Uploads are bounded by the delivery send timeout, not the API call timeout.
        let response = self
            .http_client
            .post(self.method_url("sendDocument"))
            .multipart(form)
            .send()
            .await?;
        let envelope: ApiResponse<serde_json::Value> = response.json().await?;
        envelope.into_result().map(|_| ())
    }
}
