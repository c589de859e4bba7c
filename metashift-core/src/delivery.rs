use std::path::Path;
use std::time::Duration;

use serde::Serialize;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::config::DeliverySection;
use crate::transport::{ChatTransport, TransportError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum DeliveryState {
    Pending,
    Sending { attempt: u32 },
    Delivered { attempts: u32 },
    Failed { attempts: u32 },
}

impl DeliveryState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DeliveryState::Delivered { .. } | DeliveryState::Failed { .. }
        )
    }
}

#[derive(Debug, Clone)]
pub struct DeliveryPolicy {
    pub retry_limit: u32,
    pub retry_delay: Duration,
    pub send_timeout: Duration,
}

impl DeliveryPolicy {
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }
}

impl Default for DeliveryPolicy {
    fn default() -> Self {
        Self::from(&DeliverySection::default())
    }
}

impl From<&DeliverySection> for DeliveryPolicy {
    fn from(section: &DeliverySection) -> Self {
        Self {
            retry_limit: section.retry_limit,
            retry_delay: Duration::from_secs(section.retry_delay_seconds),
            send_timeout: Duration::from_secs(section.send_timeout_seconds),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DeliveryOutcome {
    pub state: DeliveryState,
    pub transitions: Vec<DeliveryState>,
    pub last_error: Option<String>,
}

impl DeliveryOutcome {
    pub fn attempts(&self) -> u32 {
        match self.state {
            DeliveryState::Delivered { attempts } | DeliveryState::Failed { attempts } => attempts,
            DeliveryState::Sending { attempt } => attempt,
            DeliveryState::Pending => 0,
        }
    }

    pub fn is_delivered(&self) -> bool {
        matches!(self.state, DeliveryState::Delivered { .. })
    }
}

/// Sends one output file as a document, retrying with a fixed delay.
#[derive(Debug, Clone, Default)]
pub struct DeliveryRetrier {
    policy: DeliveryPolicy,
}

impl DeliveryRetrier {
    pub fn new(policy: DeliveryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &DeliveryPolicy {
        &self.policy
    }

    pub async fn deliver<T>(
        &self,
        transport: &T,
        chat_id: i64,
        path: &Path,
        file_name: &str,
    ) -> DeliveryOutcome
    where
        T: ChatTransport + ?Sized,
    {
        let limit = self.policy.retry_limit.max(1);
        let mut state = DeliveryState::Pending;
        let mut transitions = vec![state];
        let mut last_error = None;
        let mut attempt = 0u32;

        while !state.is_terminal() {
            attempt += 1;
            state = DeliveryState::Sending { attempt };
            transitions.push(state);

            let result = match timeout(
                self.policy.send_timeout,
                transport.send_document(chat_id, path, file_name),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(TransportError::Timeout(self.policy.send_timeout)),
            };

            state = match result {
                Ok(()) => {
                    info!(chat_id, attempt, "document delivered");
                    DeliveryState::Delivered { attempts: attempt }
                }
                Err(err) if attempt >= limit => {
                    warn!(chat_id, attempt, error = %err, "document delivery exhausted retries");
                    last_error = Some(err.to_string());
                    DeliveryState::Failed { attempts: attempt }
                }
                Err(err) => {
                    warn!(chat_id, attempt, wait = ?self.policy.retry_delay, error = %err, "document send failed, retrying");
                    last_error = Some(err.to_string());
                    if !self.policy.retry_delay.is_zero() {
                        sleep(self.policy.retry_delay).await;
                    }
                    continue;
                }
            };
            transitions.push(state);
        }

        debug!(chat_id, ?transitions, "delivery finished");
        DeliveryOutcome {
            state,
            transitions,
            last_error,
        }
    }
}
