pub mod config;
pub mod delivery;
pub mod dispatcher;
pub mod error;
pub mod fetcher;
pub mod metadata;
pub mod pipeline;
pub mod request;
pub mod storage;
pub mod transport;

pub use config::{load_bot_config, load_runtime_config, BotConfig};
pub use delivery::{DeliveryOutcome, DeliveryPolicy, DeliveryRetrier, DeliveryState};
pub use dispatcher::{Dispatcher, EventAction};
pub use error::{ConfigError, Result};
pub use fetcher::{FetchError, FetchResult, RemoteFetcher};
pub use metadata::{
    MetadataProfile, MetadataRandomizer, MetadataTag, RandomizedMetadata, SeedSource,
    TranscodeError, TranscodeResult,
};
pub use pipeline::{
    PipelineError, PipelineResult, PipelineStage, RequestHandler, RequestOutcome,
    GUIDANCE_MESSAGE, RECEIVED_MESSAGE,
};
pub use request::{is_video_mime, InboundRequest, RequestId};
pub use storage::{FileRole, RequestFiles, TransientFile, TransientStore};
pub use transport::{
    ChatTransport, DocumentRef, InboundEvent, LongPollSource, TelegramClient, TransportError,
    TransportResult, UpdateSource,
};
