use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use chrono::Local;
use rand::Rng;
use thiserror::Error;
use tokio::fs;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

use super::{MetadataProfile, RandomizedMetadata};

pub type TranscodeResult<T> = Result<T, TranscodeError>;

#[derive(Debug, Error)]
pub enum TranscodeError {
    #[error("failed to launch {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
    #[error("{program} exited with status {status:?}: {stderr}")]
    Failed {
        program: String,
        status: Option<i32>,
        stderr: String,
    },
    #[error("{program} timed out after {timeout:?}")]
    Timeout { program: String, timeout: Duration },
    #[error("transcoder produced no output at {path}")]
    MissingOutput { path: PathBuf },
}

/// Rewrites container tags with a stream copy; audio and video are never re-encoded.
#[derive(Debug, Clone)]
pub struct MetadataRandomizer {
    program: PathBuf,
    profile: MetadataProfile,
    timeout: Duration,
}

impl MetadataRandomizer {
    pub fn new(program: impl Into<PathBuf>, profile: MetadataProfile, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            profile,
            timeout,
        }
    }

    pub fn profile(&self) -> MetadataProfile {
        self.profile
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn generate<R: Rng + ?Sized>(&self, rng: &mut R) -> RandomizedMetadata {
        RandomizedMetadata::generate(self.profile, rng, Local::now().naive_local())
    }

    pub async fn randomize<R: Rng + ?Sized>(
        &self,
        input: &Path,
        output: &Path,
        rng: &mut R,
    ) -> TranscodeResult<RandomizedMetadata> {
        let metadata = self.generate(rng);
        self.apply(input, output, &metadata).await?;
        Ok(metadata)
    }

    pub fn build_command(
        &self,
        input: &Path,
        output: &Path,
        metadata: &RandomizedMetadata,
    ) -> Command {
        let mut command = Command::new(&self.program);
        command
            .kill_on_drop(true)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .arg("-y")
            .arg("-hide_banner")
            .arg("-loglevel")
            .arg("error")
            .arg("-i")
            .arg(input);
        for assignment in metadata.assignments() {
            command.arg("-metadata").arg(assignment);
        }
        command.arg("-codec").arg("copy").arg(output);
        command
    }

    pub async fn apply(
        &self,
        input: &Path,
        output: &Path,
        metadata: &RandomizedMetadata,
    ) -> TranscodeResult<()> {
        let mut command = self.build_command(input, output, metadata);
        debug!(program = %self.program.display(), input = %input.display(), output = %output.display(), "running transcoder");
        let result = match timeout(self.timeout, command.output()).await {
            Ok(result) => result,
            Err(_) => {
                return Err(TranscodeError::Timeout {
                    program: self.program_name(),
                    timeout: self.timeout,
                })
            }
        };
        let result = result.map_err(|source| TranscodeError::Spawn {
            program: self.program_name(),
            source,
        })?;
        if !result.status.success() {
            return Err(TranscodeError::Failed {
                program: self.program_name(),
                status: result.status.code(),
                stderr: String::from_utf8_lossy(&result.stderr).trim().to_string(),
            });
        }
        match fs::metadata(output).await {
            Ok(meta) if meta.is_file() => Ok(()),
            _ => Err(TranscodeError::MissingOutput {
                path: output.to_path_buf(),
            }),
        }
    }

    /// First line of `-version`, used by health checks.
    pub async fn version_line(&self) -> TranscodeResult<String> {
        let mut command = Command::new(&self.program);
        command
            .kill_on_drop(true)
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .arg("-version");
        let output = match timeout(Duration::from_secs(10), command.output()).await {
            Ok(result) => result.map_err(|source| TranscodeError::Spawn {
                program: self.program_name(),
                source,
            })?,
            Err(_) => {
                return Err(TranscodeError::Timeout {
                    program: self.program_name(),
                    timeout: Duration::from_secs(10),
                })
            }
        };
        if !output.status.success() {
            return Err(TranscodeError::Failed {
                program: self.program_name(),
                status: output.status.code(),
                stderr: String::new(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .next()
            .unwrap_or_default()
            .trim()
            .to_string())
    }

    fn program_name(&self) -> String {
        self.program.display().to_string()
    }
}
