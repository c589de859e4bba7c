use std::fmt;

pub const VIDEO_MIME_PREFIX: &str = "video";

const DEFAULT_EXTENSION: &str = "mp4";

const CONTAINER_EXTENSIONS: &[(&str, &str)] = &[
    ("video/mp4", "mp4"),
    ("video/quicktime", "mov"),
    ("video/webm", "webm"),
    ("video/x-matroska", "mkv"),
];

/// One file-bearing message that the pipeline has to answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundRequest {
    pub chat_id: i64,
    pub message_id: i64,
    /// MIME type as declared by the sender, never sniffed.
    pub mime_type: Option<String>,
    /// Opaque reference resolvable to a direct-download URL.
    pub file_ref: String,
    pub file_name: Option<String>,
}

impl InboundRequest {
    pub fn new(chat_id: i64, message_id: i64, file_ref: impl Into<String>) -> Self {
        Self {
            chat_id,
            message_id,
            mime_type: None,
            file_ref: file_ref.into(),
            file_name: None,
        }
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    pub fn request_id(&self) -> RequestId {
        RequestId {
            chat_id: self.chat_id,
            message_id: self.message_id,
        }
    }

    pub fn is_video(&self) -> bool {
        self.mime_type.as_deref().is_some_and(is_video_mime)
    }

    /// Container extension for the transient files; ffmpeg picks the muxer from it,
    /// so it follows the declared MIME type and never the sender's file name.
    pub fn extension(&self) -> &'static str {
        self.mime_type
            .as_deref()
            .map(container_extension)
            .unwrap_or(DEFAULT_EXTENSION)
    }

    /// Name given to the returned document.
    pub fn delivery_name(&self) -> String {
        match self.file_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => format!("video_{}.{}", self.message_id, self.extension()),
        }
    }
}

/// Identity of a request; unique per chat and message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId {
    pub chat_id: i64,
    pub message_id: i64,
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.chat_id, self.message_id)
    }
}

/// Maps a video MIME type (parameters ignored) to a muxer-friendly extension.
pub fn container_extension(mime: &str) -> &'static str {
    let essence = mime.split(';').next().unwrap_or_default().trim();
    CONTAINER_EXTENSIONS
        .iter()
        .find(|(known, _)| known.eq_ignore_ascii_case(essence))
        .map(|(_, ext)| *ext)
        .unwrap_or(DEFAULT_EXTENSION)
}

pub fn is_video_mime(mime: &str) -> bool {
    mime.as_bytes().get(..VIDEO_MIME_PREFIX.len()) == Some(VIDEO_MIME_PREFIX.as_bytes())
}
