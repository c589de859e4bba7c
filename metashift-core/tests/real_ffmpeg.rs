//! Runs the metadata rewrite against a real ffmpeg. Skipped when ffmpeg is not on PATH.

use std::path::Path;
use std::process::Command;
use std::time::Duration;

use tempfile::TempDir;

use metashift_core::{MetadataProfile, MetadataRandomizer, RandomizedMetadata, SeedSource};

fn ffmpeg_available() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

fn ffmpeg(args: &[&str]) -> String {
    let output = Command::new("ffmpeg")
        .args(["-v", "error", "-nostdin"])
        .args(args)
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "ffmpeg {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout).unwrap()
}

/// Per-packet checksums; identical when the streams were copied untouched.
fn packet_hashes(path: &Path) -> Vec<String> {
    ffmpeg(&[
        "-i",
        path.to_str().unwrap(),
        "-map",
        "0",
        "-c",
        "copy",
        "-f",
        "framemd5",
        "-",
    ])
    .lines()
    .filter(|line| !line.starts_with('#'))
    .map(str::to_string)
    .collect()
}

/// Container tags as ffmpeg reads them back.
fn container_tags(path: &Path) -> Vec<(String, String)> {
    ffmpeg(&["-i", path.to_str().unwrap(), "-f", "ffmetadata", "-"])
        .lines()
        .filter(|line| !line.starts_with(';') && !line.starts_with('['))
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| (key.to_ascii_lowercase(), value.to_string()))
        .collect()
}

fn tag<'a>(tags: &'a [(String, String)], key: &str) -> Option<&'a str> {
    tags.iter()
        .find(|(name, _)| name == key)
        .map(|(_, value)| value.as_str())
}

#[tokio::test]
async fn stream_copy_keeps_packets_and_rewrites_tags() {
    if !ffmpeg_available() {
        eprintln!("ffmpeg not found on PATH, skipping");
        return;
    }
    let temp = TempDir::new().unwrap();
    let input = temp.path().join("input.mp4");
    ffmpeg(&[
        "-f",
        "lavfi",
        "-i",
        "testsrc=duration=1:size=64x64:rate=10",
        "-c:v",
        "mpeg4",
        "-metadata",
        "title=original",
        "-y",
        input.to_str().unwrap(),
    ]);

    let randomizer =
        MetadataRandomizer::new("ffmpeg", MetadataProfile::TitleGenre, Duration::from_secs(60));
    let mut outputs: Vec<(RandomizedMetadata, Vec<(String, String)>)> = Vec::new();
    for seed in [1, 2] {
        let output = temp.path().join(format!("output_{seed}.mp4"));
        let metadata = randomizer.generate(&mut SeedSource::new(seed).rng());
        randomizer.apply(&input, &output, &metadata).await.unwrap();

        assert_eq!(packet_hashes(&output), packet_hashes(&input));
        let tags = container_tags(&output);
        assert_eq!(tag(&tags, "title"), metadata.get("title"));
        assert_eq!(tag(&tags, "genre"), metadata.get("genre"));
        outputs.push((metadata, tags));
    }

    assert_ne!(outputs[0].0, outputs[1].0);
    assert_ne!(outputs[0].1, outputs[1].1);
    assert_eq!(tag(&container_tags(&input), "title"), Some("original"));
}
