use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{ConfigError, Result};
use crate::metadata::MetadataProfile;

pub const TOKEN_ENV: &str = "METASHIFT_BOT_TOKEN";
/// Fallback variable name used by older deployments.
pub const LEGACY_TOKEN_ENV: &str = "TELEGRAM_BOT_TOKEN";
pub const WORK_DIR_ENV: &str = "METASHIFT_WORK_DIR";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    pub telegram: TelegramSection,
    pub pipeline: PipelineSection,
    pub delivery: DeliverySection,
    pub metadata: MetadataSection,
    pub transcoder: TranscoderSection,
}

impl BotConfig {
    /// Applies environment overrides using the process environment.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    pub fn with_overrides_from<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let token = lookup(TOKEN_ENV)
            .filter(|value| !value.trim().is_empty())
            .or_else(|| lookup(LEGACY_TOKEN_ENV).filter(|value| !value.trim().is_empty()));
        if let Some(token) = token {
            self.telegram.token = token.trim().to_string();
        }
        if let Some(dir) = lookup(WORK_DIR_ENV).filter(|value| !value.trim().is_empty()) {
            self.pipeline.work_dir = PathBuf::from(dir);
        }
        self
    }

    pub fn require_token(&self) -> Result<&str> {
        let token = self.telegram.token.trim();
        if token.is_empty() {
            Err(ConfigError::MissingToken)
        } else {
            Ok(token)
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.delivery.retry_limit == 0 {
            return Err(ConfigError::Invalid {
                field: "delivery.retry_limit",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.pipeline.max_concurrent_requests == 0 {
            return Err(ConfigError::Invalid {
                field: "pipeline.max_concurrent_requests",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.telegram.request_timeout_seconds <= self.telegram.poll_timeout_seconds {
            return Err(ConfigError::Invalid {
                field: "telegram.request_timeout_seconds",
                reason: format!(
                    "must exceed poll_timeout_seconds ({})",
                    self.telegram.poll_timeout_seconds
                ),
            });
        }
        if self.transcoder.binary.as_os_str().is_empty() {
            return Err(ConfigError::Invalid {
                field: "transcoder.binary",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TelegramSection {
    pub token: String,
    pub api_base: String,
    pub poll_timeout_seconds: u64,
    pub request_timeout_seconds: u64,
}

impl TelegramSection {
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_secs(self.poll_timeout_seconds)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

impl Default for TelegramSection {
    fn default() -> Self {
        Self {
            token: String::new(),
            api_base: "https://api.telegram.org".to_string(),
            poll_timeout_seconds: 60,
            request_timeout_seconds: 90,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineSection {
    pub work_dir: PathBuf,
    pub fetch_timeout_seconds: u64,
    pub transcode_timeout_seconds: u64,
    pub max_concurrent_requests: usize,
}

impl PipelineSection {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_seconds)
    }

    pub fn transcode_timeout(&self) -> Duration {
        Duration::from_secs(self.transcode_timeout_seconds)
    }
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            work_dir: std::env::temp_dir().join("metashift"),
            fetch_timeout_seconds: 300,
            transcode_timeout_seconds: 600,
            max_concurrent_requests: 8,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DeliverySection {
    pub retry_limit: u32,
    pub retry_delay_seconds: u64,
    pub send_timeout_seconds: u64,
}

impl Default for DeliverySection {
    fn default() -> Self {
        Self {
            retry_limit: 3,
            retry_delay_seconds: 2,
            send_timeout_seconds: 300,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MetadataSection {
    pub profile: MetadataProfile,
    /// Fixed base seed; a random one is drawn at startup when absent.
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TranscoderSection {
    pub binary: PathBuf,
}

impl Default for TranscoderSection {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("ffmpeg"),
        }
    }
}

pub fn load_bot_config<P: AsRef<Path>>(path: P) -> Result<BotConfig> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        source,
        path: path.to_path_buf(),
    })?;
    let config: BotConfig = toml::from_str(&content).map_err(|source| ConfigError::Parse {
        source,
        path: path.to_path_buf(),
    })?;
    config.validate()?;
    Ok(config)
}

/// Loads `.env` (if any), the config file when it exists, then env overrides.
pub fn load_runtime_config<P: AsRef<Path>>(path: P) -> Result<BotConfig> {
    let _ = dotenvy::dotenv();
    let path = path.as_ref();
    let config = if path.exists() {
        load_bot_config(path)?
    } else {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        BotConfig::default()
    };
    let config = config.with_env_overrides();
    config.validate()?;
    Ok(config)
}
