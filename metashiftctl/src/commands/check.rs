use std::path::Path;

use clap::Args;
use metashift_core::{BotConfig, MetadataRandomizer, TelegramClient};

use crate::HealthEntry;

#[derive(Args, Debug, Clone, Default)]
pub struct CheckArgs {
    /// Also calls getMe to verify the token against Telegram
    #[arg(long)]
    pub online: bool,
}

pub async fn check(config: &BotConfig, args: &CheckArgs) -> Vec<HealthEntry> {
    let mut results = Vec::new();

    let token = config.require_token().ok();
    results.push(match token {
        Some(_) => HealthEntry::ok("token", "present"),
        None => HealthEntry::error(
            "token",
            format!("missing, set {}", metashift_core::config::TOKEN_ENV),
        ),
    });

    results.push(check_transcoder(config).await);
    results.push(check_work_dir(&config.pipeline.work_dir).await);

    if args.online {
        results.push(match token {
            Some(token) => check_telegram(config, token).await,
            None => HealthEntry::warn("telegram", "skipped, no token"),
        });
    }

    results
}

async fn check_transcoder(config: &BotConfig) -> HealthEntry {
    let randomizer = MetadataRandomizer::new(
        config.transcoder.binary.clone(),
        config.metadata.profile,
        config.pipeline.transcode_timeout(),
    );
    match randomizer.version_line().await {
        Ok(version) if version.is_empty() => {
            HealthEntry::warn("transcoder", "responded without a version line")
        }
        Ok(version) => HealthEntry::ok("transcoder", version),
        Err(err) => HealthEntry::error(
            "transcoder",
            format!("{}: {err}", randomizer.program().display()),
        ),
    }
}

async fn check_work_dir(dir: &Path) -> HealthEntry {
    let marker = dir.join(".metashift-write-check");
    let result = async {
        tokio::fs::create_dir_all(dir).await?;
        tokio::fs::write(&marker, b"ok").await?;
        tokio::fs::remove_file(&marker).await
    }
    .await;
    match result {
        Ok(()) => HealthEntry::ok("work_dir", format!("{} writable", dir.display())),
        Err(err) => HealthEntry::error("work_dir", format!("{}: {err}", dir.display())),
    }
}

async fn check_telegram(config: &BotConfig, token: &str) -> HealthEntry {
    let client = match TelegramClient::new(
        token,
        config.telegram.api_base.clone(),
        config.telegram.request_timeout(),
    ) {
        Ok(client) => client,
        Err(err) => return HealthEntry::error("telegram", err.to_string()),
    };
    match client.get_me().await {
        Ok(me) => HealthEntry::ok(
            "telegram",
            format!("@{}", me.username.as_deref().unwrap_or(&me.first_name)),
        ),
        Err(err) => HealthEntry::error("telegram", err.to_string()),
    }
}
