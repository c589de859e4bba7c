use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use metashift_core::{BotConfig, Dispatcher, LongPollSource, RequestHandler, TelegramClient};
use tracing::{info, warn};

use crate::Result;

#[derive(Args, Debug, Clone, Default)]
pub struct ServeArgs {
    /// Overrides pipeline.work_dir
    #[arg(long)]
    pub work_dir: Option<PathBuf>,
    /// Overrides pipeline.max_concurrent_requests
    #[arg(long)]
    pub max_concurrent: Option<usize>,
}

impl ServeArgs {
    fn apply(&self, mut config: BotConfig) -> BotConfig {
        if let Some(dir) = &self.work_dir {
            config.pipeline.work_dir = dir.clone();
        }
        if let Some(limit) = self.max_concurrent {
            config.pipeline.max_concurrent_requests = limit;
        }
        config
    }
}

pub async fn serve(config: BotConfig, args: &ServeArgs) -> Result<()> {
    let config = args.apply(config);
    config.validate()?;
    let token = config.require_token()?;

    let client = TelegramClient::new(
        token,
        config.telegram.api_base.clone(),
        config.telegram.request_timeout(),
    )?;
    let me = client.get_me().await?;
    info!(
        bot_id = me.id,
        username = me.username.as_deref().unwrap_or(&me.first_name),
        "connected to telegram"
    );

    tokio::fs::create_dir_all(&config.pipeline.work_dir).await?;
    let handler = Arc::new(RequestHandler::from_config(
        Arc::new(client.clone()),
        &config,
    )?);
    info!(
        work_dir = %handler.store().root().display(),
        profile = %config.metadata.profile,
        max_concurrent = config.pipeline.max_concurrent_requests,
        "listening for videos"
    );
    let dispatcher = Dispatcher::new(handler, config.pipeline.max_concurrent_requests);
    let mut source = LongPollSource::new(client, config.telegram.poll_timeout());
    dispatcher
        .run(&mut source, async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!(error = %err, "failed to listen for ctrl-c, stopping");
            }
        })
        .await;
    info!("stopped");
    Ok(())
}
