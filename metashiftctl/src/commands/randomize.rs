use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use clap::Args;
use metashift_core::{BotConfig, MetadataProfile, MetadataRandomizer, MetadataTag, SeedSource};
use serde::Serialize;
use tracing::info;

use crate::{AppError, DisplayFallback, Result};

#[derive(Args, Debug, Clone)]
pub struct RandomizeArgs {
    /// Video to re-tag
    pub input: PathBuf,
    /// Destination; defaults to `<input stem>_randomized.<ext>` next to the input
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    /// Tag profile (timestamps | title-genre); defaults to metadata.profile
    #[arg(long)]
    pub profile: Option<MetadataProfile>,
    /// Fixed seed for reproducible tags
    #[arg(long)]
    pub seed: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct RandomizeReport {
    pub input: PathBuf,
    pub output: PathBuf,
    pub profile: MetadataProfile,
    pub tags: Vec<MetadataTag>,
    pub finished_at: DateTime<Utc>,
}

impl DisplayFallback for RandomizeReport {
    fn display(&self) -> String {
        let mut lines = vec![format!(
            "{} -> {} (profile: {})",
            self.input.display(),
            self.output.display(),
            self.profile
        )];
        for tag in &self.tags {
            lines.push(format!("  - {}", tag.assignment()));
        }
        lines.join("\n")
    }
}

pub async fn randomize(config: &BotConfig, args: &RandomizeArgs) -> Result<RandomizeReport> {
    if !args.input.is_file() {
        return Err(AppError::MissingInput(args.input.clone()));
    }
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| default_output(&args.input));
    let profile = args.profile.unwrap_or(config.metadata.profile);
    let randomizer = MetadataRandomizer::new(
        config.transcoder.binary.clone(),
        profile,
        config.pipeline.transcode_timeout(),
    );

    let mut rng = SeedSource::from_config(args.seed.or(config.metadata.seed)).rng();
    let metadata = randomizer.randomize(&args.input, &output, &mut rng).await?;
    info!(input = %args.input.display(), output = %output.display(), "metadata randomized");

    Ok(RandomizeReport {
        input: args.input.clone(),
        output,
        profile: randomizer.profile(),
        tags: metadata.tags().to_vec(),
        finished_at: Utc::now(),
    })
}

fn default_output(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "video".to_string());
    let name = match input.extension() {
        Some(ext) => format!("{stem}_randomized.{}", ext.to_string_lossy()),
        None => format!("{stem}_randomized.mp4"),
    };
    input.with_file_name(name)
}
