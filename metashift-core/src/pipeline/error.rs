use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::fetcher::FetchError;
use crate::metadata::TranscodeError;
use crate::transport::TransportError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Resolve,
    Download,
    Randomize,
    Deliver,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PipelineStage::Resolve => "resolve",
            PipelineStage::Download => "download",
            PipelineStage::Randomize => "randomize",
            PipelineStage::Deliver => "deliver",
        };
        write!(f, "{label}")
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("file resolution failed: {0}")]
    Resolve(#[source] TransportError),
    #[error("download failed: {0}")]
    Download(#[from] FetchError),
    #[error("metadata randomization failed: {0}")]
    Randomize(#[from] TranscodeError),
    #[error("delivery failed after {attempts} attempts: {reason}")]
    Delivery { attempts: u32, reason: String },
}

impl PipelineError {
    pub fn stage(&self) -> PipelineStage {
        match self {
            PipelineError::Resolve(_) => PipelineStage::Resolve,
            PipelineError::Download(_) => PipelineStage::Download,
            PipelineError::Randomize(_) => PipelineStage::Randomize,
            PipelineError::Delivery { .. } => PipelineStage::Deliver,
        }
    }

    pub fn user_code(&self) -> &'static str {
        match self.stage() {
            PipelineStage::Resolve => "ERR:01",
            PipelineStage::Download => "ERR:02",
            PipelineStage::Randomize => "ERR:03",
            PipelineStage::Deliver => "ERR:04",
        }
    }

    /// Text sent back to the user; never includes the underlying cause.
    pub fn user_message(&self) -> String {
        format!(
            "Sorry, I could not process your video ({}). Please try again later.",
            self.user_code()
        )
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn every_stage_has_a_distinct_code() {
        let errors = [
            PipelineError::Resolve(TransportError::Timeout(Duration::from_secs(1))),
            PipelineError::Download(FetchError::Timeout(Duration::from_secs(1))),
            PipelineError::Randomize(TranscodeError::MissingOutput {
                path: "out.mp4".into(),
            }),
            PipelineError::Delivery {
                attempts: 3,
                reason: "boom".into(),
            },
        ];
        let codes: Vec<&str> = errors.iter().map(PipelineError::user_code).collect();
        assert_eq!(codes, ["ERR:01", "ERR:02", "ERR:03", "ERR:04"]);
        for error in &errors {
            assert!(error.user_message().contains(error.user_code()));
        }
    }
}
