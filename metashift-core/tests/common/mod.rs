#![allow(dead_code)]

use std::collections::HashMap;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use metashift_core::{
    ChatTransport, DeliveryPolicy, DeliveryRetrier, MetadataProfile, MetadataRandomizer,
    RemoteFetcher, RequestHandler, SeedSource, TransientStore, TransportError, TransportResult,
};

#[derive(Debug, Clone)]
pub struct SentDocument {
    pub chat_id: i64,
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// In-memory transport that records every outbound call.
#[derive(Default)]
pub struct RecordingTransport {
    urls: HashMap<String, String>,
    send_failures: AtomicU32,
    pub resolve_calls: AtomicU32,
    pub document_attempts: AtomicU32,
    pub texts: Mutex<Vec<(i64, String)>>,
    pub documents: Mutex<Vec<SentDocument>>,
}

impl RecordingTransport {
    pub fn with_file(mut self, file_ref: &str, url: String) -> Self {
        self.urls.insert(file_ref.to_string(), url);
        self
    }

    pub fn failing_sends(self, count: u32) -> Self {
        self.send_failures.store(count, Ordering::SeqCst);
        self
    }

    pub fn texts(&self) -> Vec<String> {
        self.texts
            .lock()
            .unwrap()
            .iter()
            .map(|(_, text)| text.clone())
            .collect()
    }

    pub fn documents(&self) -> Vec<SentDocument> {
        self.documents.lock().unwrap().clone()
    }

    pub fn error_texts(&self) -> Vec<String> {
        self.texts()
            .into_iter()
            .filter(|text| text.contains("ERR:"))
            .collect()
    }
}

#[async_trait]
impl ChatTransport for RecordingTransport {
    async fn resolve_file_url(&self, file_ref: &str) -> TransportResult<String> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        self.urls
            .get(file_ref)
            .cloned()
            .ok_or_else(|| TransportError::Api {
                code: Some(400),
                description: "Bad Request: invalid file_id".to_string(),
            })
    }

    async fn send_text(&self, chat_id: i64, text: &str) -> TransportResult<()> {
        self.texts.lock().unwrap().push((chat_id, text.to_string()));
        Ok(())
    }

    async fn send_document(
        &self,
        chat_id: i64,
        path: &Path,
        file_name: &str,
    ) -> TransportResult<()> {
        self.document_attempts.fetch_add(1, Ordering::SeqCst);
        let remaining = self.send_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.send_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(TransportError::Network("connection reset by peer".into()));
        }
        let bytes = std::fs::read(path).map_err(|source| TransportError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.documents.lock().unwrap().push(SentDocument {
            chat_id,
            file_name: file_name.to_string(),
            bytes,
        });
        Ok(())
    }
}

/// Stand-ins for ffmpeg, written once per test binary.
pub struct Transcoders {
    _root: tempfile::TempDir,
    pub dir: PathBuf,
    pub copying: PathBuf,
    pub failing: PathBuf,
    pub silent: PathBuf,
    pub hanging: PathBuf,
}

impl Transcoders {
    /// argv recorded by the copying stand-in for the given output file.
    pub fn recorded_args(&self, output_name: &str) -> Vec<String> {
        let log = self.dir.join(format!("{output_name}.args"));
        std::fs::read_to_string(log)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }
}

pub fn transcoders() -> &'static Transcoders {
    static TRANSCODERS: OnceLock<Transcoders> = OnceLock::new();
    TRANSCODERS.get_or_init(|| {
        let root = tempfile::TempDir::new().unwrap();
        let dir = root.path().to_path_buf();
        let copying = write_script(
            &dir,
            "ffmpeg-copy",
            &format!(
                r#"input=""
prev=""
for arg in "$@"; do
  if [ "$prev" = "-i" ]; then input="$arg"; fi
  prev="$arg"
done
printf '%s\n' "$@" > "{}/$(basename "$prev").args"
cp "$input" "$prev""#,
                dir.display()
            ),
        );
        let failing = write_script(
            &dir,
            "ffmpeg-fail",
            "echo 'Invalid data found when processing input' >&2\nexit 1",
        );
        let silent = write_script(&dir, "ffmpeg-silent", "exit 0");
        let hanging = write_script(&dir, "ffmpeg-hang", "exec sleep 30");
        Transcoders {
            _root: root,
            dir,
            copying,
            failing,
            silent,
            hanging,
        }
    })
}

fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    let mut permissions = std::fs::metadata(&path).unwrap().permissions();
    permissions.set_mode(0o755);
    std::fs::set_permissions(&path, permissions).unwrap();
    path
}

/// Local HTTP endpoint that answers one request with the given status and an empty body.
pub async fn http_status_url(status: &'static str) -> String {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = [0u8; 2048];
        let _ = socket.read(&mut buf).await;
        let response =
            format!("HTTP/1.1 {status}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n");
        let _ = socket.write_all(response.as_bytes()).await;
    });
    format!("http://{addr}/file/bot1:token/documents/expired.mp4")
}

pub fn file_url(path: &Path) -> String {
    Url::from_file_path(path).unwrap().to_string()
}

pub fn handler_with(
    transport: Arc<RecordingTransport>,
    work_dir: &Path,
    transcoder: &Path,
    transcode_timeout: Duration,
) -> RequestHandler<RecordingTransport> {
    RequestHandler::new(
        transport,
        TransientStore::new(work_dir),
        RemoteFetcher::new(Duration::from_secs(5)).unwrap(),
        MetadataRandomizer::new(transcoder, MetadataProfile::Timestamps, transcode_timeout),
        DeliveryRetrier::new(DeliveryPolicy::default().with_retry_delay(Duration::from_millis(5))),
        SeedSource::new(7),
    )
}

pub fn handler(
    transport: Arc<RecordingTransport>,
    work_dir: &Path,
    transcoder: &Path,
) -> RequestHandler<RecordingTransport> {
    handler_with(transport, work_dir, transcoder, Duration::from_secs(10))
}

pub fn remaining_files(dir: &Path) -> usize {
    match std::fs::read_dir(dir) {
        Ok(entries) => entries.count(),
        Err(_) => 0,
    }
}
