//! Per-request orchestration: validate, resolve, fetch, randomize, deliver, clean up.

mod error;

use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, warn};

use crate::config::BotConfig;
use crate::delivery::{DeliveryPolicy, DeliveryRetrier, DeliveryState};
use crate::fetcher::{FetchResult, RemoteFetcher};
use crate::metadata::{MetadataRandomizer, SeedSource};
use crate::request::{InboundRequest, RequestId};
use crate::storage::{RequestFiles, TransientStore};
use crate::transport::ChatTransport;

pub use error::{PipelineError, PipelineResult, PipelineStage};

pub const GUIDANCE_MESSAGE: &str = "Please send a valid video file (.mp4).";
pub const RECEIVED_MESSAGE: &str = "Video received, randomizing its metadata...";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum RequestOutcome {
    /// Not a video; the guidance message was sent.
    Rejected,
    Delivered { attempts: u32 },
    Failed {
        stage: PipelineStage,
        code: &'static str,
    },
}

pub struct RequestHandler<T: ?Sized> {
    transport: Arc<T>,
    store: TransientStore,
    fetcher: RemoteFetcher,
    randomizer: MetadataRandomizer,
    retrier: DeliveryRetrier,
    seeds: SeedSource,
}

impl<T> RequestHandler<T>
where
    T: ChatTransport + ?Sized,
{
    pub fn new(
        transport: Arc<T>,
        store: TransientStore,
        fetcher: RemoteFetcher,
        randomizer: MetadataRandomizer,
        retrier: DeliveryRetrier,
        seeds: SeedSource,
    ) -> Self {
        Self {
            transport,
            store,
            fetcher,
            randomizer,
            retrier,
            seeds,
        }
    }

    pub fn from_config(transport: Arc<T>, config: &BotConfig) -> FetchResult<Self> {
        let fetcher = RemoteFetcher::new(config.pipeline.fetch_timeout())?;
        let randomizer = MetadataRandomizer::new(
            config.transcoder.binary.clone(),
            config.metadata.profile,
            config.pipeline.transcode_timeout(),
        );
        Ok(Self::new(
            transport,
            TransientStore::new(config.pipeline.work_dir.clone()),
            fetcher,
            randomizer,
            DeliveryRetrier::new(DeliveryPolicy::from(&config.delivery)),
            SeedSource::from_config(config.metadata.seed),
        ))
    }

    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    pub fn store(&self) -> &TransientStore {
        &self.store
    }

    pub async fn handle(&self, request: &InboundRequest) -> RequestOutcome {
        let request_id = request.request_id();
        if !request.is_video() {
            info!(%request_id, mime_type = ?request.mime_type, "rejecting non-video document");
            self.reply(request_id, GUIDANCE_MESSAGE).await;
            return RequestOutcome::Rejected;
        }

        info!(%request_id, mime_type = ?request.mime_type, "processing video");
        self.reply(request_id, RECEIVED_MESSAGE).await;

        let files = self.store.allocate(request);
        let result = self.run_stages(request, &files).await;
        files.release().await;

        match result {
            Ok(attempts) => RequestOutcome::Delivered { attempts },
            Err(err) => {
                error!(%request_id, stage = %err.stage(), code = err.user_code(), error = %err, "request failed");
                self.reply(request_id, &err.user_message()).await;
                RequestOutcome::Failed {
                    stage: err.stage(),
                    code: err.user_code(),
                }
            }
        }
    }

    async fn run_stages(
        &self,
        request: &InboundRequest,
        files: &RequestFiles,
    ) -> PipelineResult<u32> {
        let request_id = request.request_id();

        let url = self
            .transport
            .resolve_file_url(&request.file_ref)
            .await
            .map_err(PipelineError::Resolve)?;

        let size = self
            .fetcher
            .fetch_to_file(&url, files.input.path())
            .await?;
        info!(%request_id, bytes = size, "download complete");

        let metadata = {
            let mut rng = self.seeds.rng_for(request_id);
            self.randomizer.generate(&mut rng)
        };
        self.randomizer
            .apply(files.input.path(), files.output.path(), &metadata)
            .await?;
        info!(%request_id, profile = %metadata.profile, tags = ?metadata.tags(), "metadata randomized");

        let outcome = self
            .retrier
            .deliver(
                self.transport.as_ref(),
                request.chat_id,
                files.output.path(),
                &request.delivery_name(),
            )
            .await;
        match outcome.state {
            DeliveryState::Delivered { attempts } => Ok(attempts),
            _ => Err(PipelineError::Delivery {
                attempts: outcome.attempts(),
                reason: outcome
                    .last_error
                    .unwrap_or_else(|| "unknown delivery failure".to_string()),
            }),
        }
    }

    /// Informational and error replies are not retried, only logged on failure.
    async fn reply(&self, request_id: RequestId, text: &str) {
        if let Err(err) = self.transport.send_text(request_id.chat_id, text).await {
            warn!(%request_id, error = %err, "failed to send reply");
        }
    }
}
