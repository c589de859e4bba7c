//! Randomized container tags and the ffmpeg invocation that applies them.

mod transcoder;

use std::fmt;
use std::str::FromStr;

use chrono::{Duration, Months, NaiveDateTime};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};

use crate::request::RequestId;

pub use transcoder::{MetadataRandomizer, TranscodeError, TranscodeResult};

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

const MAX_YEARS_BACK: u32 = 5;
const MAX_MONTHS_BACK: u32 = 12;
const MAX_DAYS_BACK: i64 = 28;
const FUTURE_WINDOW_SECONDS: i64 = 24 * 60 * 60;

/// Which set of tags gets rewritten.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataProfile {
    /// `creation_time` in the past, `modification_time` strictly later than now, within a day.
    #[default]
    Timestamps,
    /// `title`, `genre` and a past `date`.
    TitleGenre,
}

impl fmt::Display for MetadataProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataProfile::Timestamps => write!(f, "timestamps"),
            MetadataProfile::TitleGenre => write!(f, "title_genre"),
        }
    }
}

impl FromStr for MetadataProfile {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "timestamps" => Ok(MetadataProfile::Timestamps),
            "title_genre" | "title-genre" => Ok(MetadataProfile::TitleGenre),
            other => Err(format!(
                "unknown metadata profile '{other}' (expected timestamps or title_genre)"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetadataTag {
    pub key: String,
    pub value: String,
}

impl MetadataTag {
    fn new(key: &str, value: String) -> Self {
        Self {
            key: key.to_string(),
            value,
        }
    }

    /// `key=value` as ffmpeg's `-metadata` expects it.
    pub fn assignment(&self) -> String {
        format!("{}={}", self.key, self.value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RandomizedMetadata {
    pub profile: MetadataProfile,
    tags: Vec<MetadataTag>,
}

impl RandomizedMetadata {
    /// `now` is the local wall-clock time the dates are relative to.
    pub fn generate<R: Rng + ?Sized>(
        profile: MetadataProfile,
        rng: &mut R,
        now: NaiveDateTime,
    ) -> Self {
        let tags = match profile {
            MetadataProfile::Timestamps => {
                let created = random_past(rng, now);
                let modified = now + Duration::seconds(rng.gen_range(1..=FUTURE_WINDOW_SECONDS));
                vec![
                    MetadataTag::new("creation_time", created.format(TIMESTAMP_FORMAT).to_string()),
                    MetadataTag::new(
                        "modification_time",
                        modified.format(TIMESTAMP_FORMAT).to_string(),
                    ),
                ]
            }
            MetadataProfile::TitleGenre => {
                let title = format!("RandomTitle{}", rng.gen_range(0..100));
                let genre = format!("Genre{}", rng.gen_range(0..100));
                let date = random_past(rng, now);
                vec![
                    MetadataTag::new("title", title),
                    MetadataTag::new("genre", genre),
                    MetadataTag::new("date", date.format(DATE_FORMAT).to_string()),
                ]
            }
        };
        Self { profile, tags }
    }

    pub fn tags(&self) -> &[MetadataTag] {
        &self.tags
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|tag| tag.key == key)
            .map(|tag| tag.value.as_str())
    }

    pub fn assignments(&self) -> impl Iterator<Item = String> + '_ {
        self.tags.iter().map(MetadataTag::assignment)
    }
}

fn random_past<R: Rng + ?Sized>(rng: &mut R, now: NaiveDateTime) -> NaiveDateTime {
    let years = rng.gen_range(0..MAX_YEARS_BACK);
    let months = rng.gen_range(0..MAX_MONTHS_BACK);
    let days = rng.gen_range(0..MAX_DAYS_BACK);
    now.checked_sub_months(Months::new(years * 12 + months))
        .unwrap_or(now)
        - Duration::days(days)
}

/// Hands out an independent generator per request, derived from one base seed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedSource {
    base: u64,
}

impl SeedSource {
    pub fn new(base: u64) -> Self {
        Self { base }
    }

    pub fn from_entropy() -> Self {
        Self::new(rand::random())
    }

    pub fn from_config(seed: Option<u64>) -> Self {
        seed.map(Self::new).unwrap_or_else(Self::from_entropy)
    }

    pub fn base(&self) -> u64 {
        self.base
    }

    pub fn rng_for(&self, request: RequestId) -> ChaCha20Rng {
        // FNV-1a over the request identity, offset by the base seed.
        let mut hash = 0xcbf2_9ce4_8422_2325u64 ^ self.base;
        for byte in request
            .chat_id
            .to_le_bytes()
            .into_iter()
            .chain(request.message_id.to_le_bytes())
        {
            hash ^= u64::from(byte);
            hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
        }
        ChaCha20Rng::seed_from_u64(hash)
    }

    /// Generator for one-off work outside the bot, e.g. a local file.
    pub fn rng(&self) -> ChaCha20Rng {
        ChaCha20Rng::seed_from_u64(self.base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 31)
            .unwrap()
            .and_hms_opt(12, 30, 15)
            .unwrap()
    }

    fn id(message_id: i64) -> RequestId {
        RequestId {
            chat_id: 77,
            message_id,
        }
    }

    #[test]
    fn timestamp_profile_produces_parseable_bounded_values() {
        let seeds = SeedSource::new(9);
        for message_id in 0..200 {
            let mut rng = seeds.rng_for(id(message_id));
            let metadata =
                RandomizedMetadata::generate(MetadataProfile::Timestamps, &mut rng, now());
            let created = NaiveDateTime::parse_from_str(
                metadata.get("creation_time").unwrap(),
                TIMESTAMP_FORMAT,
            )
            .unwrap();
            let modified = NaiveDateTime::parse_from_str(
                metadata.get("modification_time").unwrap(),
                TIMESTAMP_FORMAT,
            )
            .unwrap();
            assert!(created <= now());
            assert!(created > now() - Duration::days(5 * 366));
            assert!(modified > now());
            assert!(modified <= now() + Duration::hours(24));
        }
    }

    #[test]
    fn smallest_draw_still_lands_after_now() {
        let mut rng = rand::rngs::mock::StepRng::new(0, 0);
        let metadata = RandomizedMetadata::generate(MetadataProfile::Timestamps, &mut rng, now());
        let modified = NaiveDateTime::parse_from_str(
            metadata.get("modification_time").unwrap(),
            TIMESTAMP_FORMAT,
        )
        .unwrap();
        assert_eq!(modified, now() + Duration::seconds(1));
        assert_eq!(metadata.get("creation_time").unwrap(), "2024-03-31T12:30:15");
    }

    #[test]
    fn title_genre_profile_matches_expected_shapes() {
        let mut rng = SeedSource::new(3).rng_for(id(1));
        let metadata = RandomizedMetadata::generate(MetadataProfile::TitleGenre, &mut rng, now());
        let keys: Vec<&str> = metadata.tags().iter().map(|t| t.key.as_str()).collect();
        assert_eq!(keys, ["title", "genre", "date"]);

        let title = metadata.get("title").unwrap();
        let n: u32 = title.strip_prefix("RandomTitle").unwrap().parse().unwrap();
        assert!(n < 100);
        let genre = metadata.get("genre").unwrap();
        assert!(genre.strip_prefix("Genre").unwrap().parse::<u32>().unwrap() < 100);
        let date = NaiveDate::parse_from_str(metadata.get("date").unwrap(), DATE_FORMAT).unwrap();
        assert!(date <= now().date());
    }

    #[test]
    fn same_seed_reproduces_and_different_seeds_diverge() {
        let generate = |base: u64| {
            let mut rng = SeedSource::new(base).rng_for(id(5));
            RandomizedMetadata::generate(MetadataProfile::Timestamps, &mut rng, now())
        };
        assert_eq!(generate(1), generate(1));
        assert_ne!(generate(1), generate(2));
    }

    #[test]
    fn configured_seed_is_used_as_is() {
        assert_eq!(SeedSource::from_config(Some(5)).base(), 5);
        let mut a = SeedSource::from_config(Some(5)).rng();
        let mut b = SeedSource::new(5).rng();
        assert_eq!(a.gen::<u64>(), b.gen::<u64>());
    }

    #[test]
    fn requests_get_distinct_generators() {
        let seeds = SeedSource::new(11);
        let mut a = seeds.rng_for(id(1));
        let mut b = seeds.rng_for(id(2));
        assert_ne!(a.gen::<u64>(), b.gen::<u64>());
    }

    #[test]
    fn assignments_are_key_value_pairs() {
        let mut rng = SeedSource::new(0).rng_for(id(0));
        let metadata = RandomizedMetadata::generate(MetadataProfile::Timestamps, &mut rng, now());
        let assignments: Vec<String> = metadata.assignments().collect();
        assert_eq!(assignments.len(), 2);
        assert!(assignments[0].starts_with("creation_time="));
        assert!(assignments[1].starts_with("modification_time="));
    }

    #[test]
    fn profile_parses_from_cli_spelling() {
        assert_eq!(
            "title-genre".parse::<MetadataProfile>().unwrap(),
            MetadataProfile::TitleGenre
        );
        assert_eq!(
            "Timestamps".parse::<MetadataProfile>().unwrap(),
            MetadataProfile::Timestamps
        );
        assert!("exif".parse::<MetadataProfile>().is_err());
    }
}
