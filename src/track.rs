//! Track records as they flow from the provider into the queue.

use serde::{Deserialize, Deserializer, Serialize};

use crate::metadata::{self, NormalizedMetadata};
use crate::quality;

/// Raw search hit from a provider, before scoring.
///
/// Deserialisation is lenient: providers are not trusted to send clean data,
/// so a missing id is kept as `None` (the record is dropped later) and a
/// duration that is not a number becomes unknown.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CandidateRecord {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default, alias = "uploader")]
    pub channel: String,
    #[serde(default, deserialize_with = "lenient_duration")]
    pub duration: Option<f64>,
    #[serde(default, alias = "view_count")]
    pub popularity: Option<u64>,
    /// Pre-resolved playback locator, when the provider already knows it
    #[serde(default, alias = "url")]
    pub locator: Option<String>,
}

impl CandidateRecord {
    pub fn new(id: &str, title: &str, channel: &str, duration: f64) -> Self {
        Self {
            id: Some(id.to_string()),
            title: title.to_string(),
            channel: channel.to_string(),
            duration: Some(duration),
            popularity: None,
            locator: None,
        }
    }

    /// Duration in whole seconds; anything non-finite or non-positive is 0 (unknown).
    pub fn duration_secs(&self) -> u32 {
        match self.duration {
            Some(d) if d.is_finite() && d > 0.0 => d.round().min(f64::from(u32::MAX)) as u32,
            _ => 0,
        }
    }

    pub fn quality_score(&self) -> f64 {
        quality::score_track(
            &self.title,
            &self.channel,
            i64::from(self.duration_secs()),
            self.popularity.unwrap_or(0),
        )
    }
}

fn lenient_duration<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    })
}

/// A playable track. Equality and hashing go by `id` only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Track {
    /// Provider-assigned, unique
    pub id: String,
    pub title: String,
    pub channel: String,
    /// Seconds; 0 when unknown
    pub duration: u32,
    /// Playback locator, filled lazily once resolved
    pub locator: Option<String>,
    pub quality_score: f64,
    pub metadata: NormalizedMetadata,
    /// Injected by the discovery scheduler rather than requested by the user
    pub discovered: bool,
}

impl Track {
    /// Build a track from a provider record.
    ///
    /// Returns `None` for records without a usable id.
    pub fn from_candidate(record: &CandidateRecord) -> Option<Self> {
        let id = record.id.as_deref().map(str::trim).filter(|id| !id.is_empty())?;
        let channel = (!record.channel.is_empty()).then_some(record.channel.as_str());

        Some(Self {
            id: id.to_string(),
            title: record.title.clone(),
            channel: record.channel.clone(),
            duration: record.duration_secs(),
            locator: record.locator.clone(),
            quality_score: record.quality_score(),
            metadata: metadata::extract(&record.title, channel),
            discovered: false,
        })
    }

    /// Build a track directly; the quality score is computed from the fields.
    pub fn new(id: &str, title: &str, channel: &str, duration: u32) -> Self {
        let record = CandidateRecord::new(id, title, channel, f64::from(duration));
        // `record` always has an id
        Self::from_candidate(&record).unwrap_or_else(|| Self {
            id: id.to_string(),
            title: title.to_string(),
            channel: channel.to_string(),
            duration,
            locator: None,
            quality_score: quality::BASE_SCORE,
            metadata: metadata::extract(title, None),
            discovered: false,
        })
    }

    pub fn artist(&self) -> &str {
        &self.metadata.artist
    }

    /// Same non-empty artist as `other`.
    pub fn shares_artist_with(&self, other: &Track) -> bool {
        self.metadata.has_artist() && self.metadata.artist == other.metadata.artist
    }

    pub fn with_quality(mut self, quality_score: f64) -> Self {
        self.quality_score = quality_score.clamp(0.0, 1.0);
        self
    }
}

impl PartialEq for Track {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Track {}

impl std::hash::Hash for Track {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl std::fmt::Display for Track {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.metadata.has_artist() {
            write!(f, "{} - {}", self.metadata.artist, self.metadata.title)
        } else {
            write!(f, "{}", self.title)
        }
    }
}
