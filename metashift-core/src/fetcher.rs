use std::path::Path;
use std::time::Duration;

use futures::StreamExt;
use reqwest::Client;
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::time::timeout;
use url::Url;

/// Every fetch failure is a single class for callers; the variants only
/// exist to make log lines useful.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("http client setup failed: {0}")]
    Client(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("io error at {path}: {source}")]
    Io {
        source: std::io::Error,
        path: std::path::PathBuf,
    },
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("download timed out after {0:?}")]
    Timeout(Duration),
}

impl From<reqwest::Error> for FetchError {
    fn from(error: reqwest::Error) -> Self {
        // Direct URLs embed the bot token.
        FetchError::Network(error.without_url().to_string())
    }
}

pub type FetchResult<T> = Result<T, FetchError>;

#[derive(Debug, Clone)]
pub struct RemoteFetcher {
    http_client: Client,
    timeout: Duration,
}

impl RemoteFetcher {
    pub fn new(timeout: Duration) -> FetchResult<Self> {
        let http_client = Client::builder()
            .user_agent("metashift/0.1")
            .build()
            .map_err(|err| FetchError::Client(err.to_string()))?;
        Ok(Self::with_client(http_client, timeout))
    }

    pub fn with_client(http_client: Client, timeout: Duration) -> Self {
        Self {
            http_client,
            timeout,
        }
    }

    /// Streams the body at `url` into `path`, returning the number of bytes
    /// written. On error the destination may exist but must not be used.
    pub async fn fetch_to_file(&self, url: &str, path: &Path) -> FetchResult<u64> {
        match timeout(self.timeout, self.stream_to_file(url, path)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout(self.timeout)),
        }
    }

    async fn stream_to_file(&self, url: &str, path: &Path) -> FetchResult<u64> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|source| FetchError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }
        let mut file = fs::File::create(path)
            .await
            .map_err(|source| FetchError::Io {
                path: path.to_path_buf(),
                source,
            })?;

        let parsed = Url::parse(url).map_err(|err| FetchError::InvalidUrl(err.to_string()))?;
        let written = if parsed.scheme() == "file" {
            let source_path = parsed
                .to_file_path()
                .map_err(|_| FetchError::InvalidUrl("invalid file url".into()))?;
            let mut source = fs::File::open(&source_path)
                .await
                .map_err(|source| FetchError::Io {
                    path: source_path.clone(),
                    source,
                })?;
            tokio::io::copy(&mut source, &mut file)
                .await
                .map_err(|source| FetchError::Io {
                    path: path.to_path_buf(),
                    source,
                })?
        } else {
            let response = self
                .http_client
                .get(parsed)
                .send()
                .await?
                .error_for_status()?;
            let mut stream = response.bytes_stream();
            let mut written = 0u64;
            while let Some(chunk) = stream.next().await {
                let data = chunk?;
                file.write_all(&data)
                    .await
                    .map_err(|source| FetchError::Io {
                        path: path.to_path_buf(),
                        source,
                    })?;
                written += data.len() as u64;
            }
            written
        };

        file.flush().await.map_err(|source| FetchError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(written)
    }
}
