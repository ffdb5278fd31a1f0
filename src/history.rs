//! # Listening History
//!
//! Per-track play/skip counters and per-artist preference scores, plus the
//! composite desirability score the smart queue ranks by.
//!
//! ## Reinforcement
//!
//! Preferences start neutral at 0.5. A play nudges the artist up by a small
//! reward; an early skip (less than `skip_threshold` of the track heard)
//! pulls it down by a larger penalty, so disliked artists sink faster than
//! liked ones rise.
//!
//! ## Persistence
//!
//! The whole document is written to the [`Store`] after every mutation.
//! A failed write is logged and the in-memory state stays authoritative.

use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::store::Store;
use crate::track::Track;

/// Namespace the history document is stored under.
pub const HISTORY_NAMESPACE: &str = "history";

/// Current persisted layout.
pub const SCHEMA_VERSION: u32 = 1;

const NEUTRAL_PREFERENCE: f64 = 0.5;
const TWO_HOURS_SECS: i64 = 2 * 3600;
const ONE_DAY_SECS: i64 = 24 * 3600;

/// Tunables for scoring and reinforcement (`[history]` in the config file).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistorySettings {
    /// Lower bound of the preferred duration range (seconds)
    pub preferred_duration_min: u32,
    /// Upper bound of the preferred duration range (seconds)
    pub preferred_duration_max: u32,
    /// Fraction of a track below which a skip counts as early
    pub skip_threshold: f64,
    pub play_reward: f64,
    pub skip_penalty: f64,
}

impl Default for HistorySettings {
    fn default() -> Self {
        Self {
            preferred_duration_min: 120,
            preferred_duration_max: 360,
            skip_threshold: 0.3,
            play_reward: 0.01,
            skip_penalty: 0.02,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackStats {
    pub title: String,
    pub artist: String,
    pub play_count: u32,
    pub skip_count: u32,
    /// Unix seconds of the last play
    pub last_played: Option<i64>,
    pub seconds_played: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtistStats {
    pub play_count: u32,
    pub preference_score: f64,
}

impl Default for ArtistStats {
    fn default() -> Self {
        Self {
            play_count: 0,
            preference_score: NEUTRAL_PREFERENCE,
        }
    }
}

/// The persisted document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryDocument {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    #[serde(default)]
    pub tracks: HashMap<String, TrackStats>,
    #[serde(default)]
    pub artists: HashMap<String, ArtistStats>,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

impl Default for HistoryDocument {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            tracks: HashMap::new(),
            artists: HashMap::new(),
        }
    }
}

impl HistoryDocument {
    /// Decode a stored document, falling back to an empty one for anything
    /// newer than we understand or anything malformed.
    fn from_value(value: serde_json::Value) -> Self {
        let version = value
            .get("schema_version")
            .and_then(serde_json::Value::as_u64)
            .unwrap_or(u64::from(SCHEMA_VERSION));
        if version > u64::from(SCHEMA_VERSION) {
            warn!("History schema version {version} is newer than {SCHEMA_VERSION}; starting empty");
            return Self::default();
        }

        match serde_json::from_value(value) {
            Ok(doc) => doc,
            Err(e) => {
                warn!("Ignoring malformed history document: {e}");
                Self::default()
            }
        }
    }
}

/// Listening history bound to a store.
pub struct ListeningHistory {
    store: Arc<dyn Store>,
    settings: HistorySettings,
    doc: HistoryDocument,
}

impl std::fmt::Debug for ListeningHistory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListeningHistory")
            .field("settings", &self.settings)
            .field("tracks", &self.doc.tracks.len())
            .field("artists", &self.doc.artists.len())
            .finish()
    }
}

impl ListeningHistory {
    /// Load history from `store`. Load failures are logged and yield an empty history.
    pub fn load(store: Arc<dyn Store>, settings: HistorySettings) -> Self {
        let doc = match store.load(HISTORY_NAMESPACE) {
            Ok(Some(value)) => HistoryDocument::from_value(value),
            Ok(None) => HistoryDocument::default(),
            Err(e) => {
                warn!("Could not load listening history: {e:#}");
                HistoryDocument::default()
            }
        };

        debug!(
            "Loaded history: {} tracks, {} artists",
            doc.tracks.len(),
            doc.artists.len()
        );
        Self { store, settings, doc }
    }

    pub fn settings(&self) -> &HistorySettings {
        &self.settings
    }

    pub fn document(&self) -> &HistoryDocument {
        &self.doc
    }

    pub fn track_stats(&self, id: &str) -> Option<&TrackStats> {
        self.doc.tracks.get(id)
    }

    fn track_entry(&mut self, track: &Track) -> &mut TrackStats {
        self.doc
            .tracks
            .entry(track.id.clone())
            .or_insert_with(|| TrackStats {
                title: track.title.clone(),
                artist: track.metadata.artist.clone(),
                ..TrackStats::default()
            })
    }

    /// Record a (near-)complete play of `track`.
    pub fn record_play(&mut self, track: &Track, seconds_played: f64) {
        self.record_play_at(track, seconds_played, chrono::Utc::now().timestamp());
    }

    /// [`record_play`](Self::record_play) with an explicit clock.
    pub fn record_play_at(&mut self, track: &Track, seconds_played: f64, now: i64) {
        let stats = self.track_entry(track);
        stats.play_count += 1;
        stats.last_played = Some(now);
        if seconds_played.is_finite() && seconds_played > 0.0 {
            stats.seconds_played += seconds_played;
        }

        if track.metadata.has_artist() {
            let reward = self.settings.play_reward;
            let artist = self.doc.artists.entry(track.metadata.artist.clone()).or_default();
            artist.play_count += 1;
            artist.preference_score = (artist.preference_score + reward).min(1.0);
        }

        self.persist();
    }

    /// Record a skip after `seconds_played`. An unknown duration counts as an early skip.
    pub fn record_skip(&mut self, track: &Track, seconds_played: f64) {
        self.track_entry(track).skip_count += 1;

        let ratio = if track.duration > 0 {
            seconds_played.max(0.0) / f64::from(track.duration)
        } else {
            0.0
        };

        if track.metadata.has_artist() && ratio < self.settings.skip_threshold {
            let penalty = self.settings.skip_penalty;
            let artist = self.doc.artists.entry(track.metadata.artist.clone()).or_default();
            artist.preference_score = (artist.preference_score - penalty).max(0.0);
            debug!(
                "Early skip of '{}' ({:.0}%), '{}' preference now {:.3}",
                track.title,
                ratio * 100.0,
                track.metadata.artist,
                artist.preference_score
            );
        }

        self.persist();
    }

    /// Preference for `artist`; 0.5 when unknown or empty.
    pub fn artist_preference(&self, artist: &str) -> f64 {
        if artist.is_empty() {
            return NEUTRAL_PREFERENCE;
        }
        self.doc
            .artists
            .get(artist)
            .map_or(NEUTRAL_PREFERENCE, |a| a.preference_score)
    }

    /// Composite desirability of `track` in `[0, 1]`.
    pub fn track_score(&self, track: &Track) -> f64 {
        self.track_score_at(track, chrono::Utc::now().timestamp())
    }

    /// [`track_score`](Self::track_score) evaluated at unix time `now`.
    pub fn track_score_at(&self, track: &Track, now: i64) -> f64 {
        let preference = self.artist_preference(&track.metadata.artist);
        let mut score = (track.quality_score + preference) / 2.0;

        // Unknown duration gets neither bonus nor penalty
        if track.duration > 0 {
            let min = f64::from(self.settings.preferred_duration_min);
            let max = f64::from(self.settings.preferred_duration_max);
            let duration = f64::from(track.duration);
            if (min..=max).contains(&duration) {
                score += 0.1;
            } else if duration < min * 0.5 || duration > max * 2.0 {
                score -= 0.2;
            }
        }

        if let Some(last) = self.doc.tracks.get(&track.id).and_then(|s| s.last_played) {
            let elapsed = now - last;
            if elapsed < TWO_HOURS_SECS {
                score -= 0.3;
            } else if elapsed < ONE_DAY_SECS {
                score -= 0.1;
            }
        }

        score.clamp(0.0, 1.0)
    }

    /// Up to `n` artists, best preference first, then most played.
    pub fn top_artists(&self, n: usize) -> Vec<(String, ArtistStats)> {
        let mut artists: Vec<_> = self
            .doc
            .artists
            .iter()
            .map(|(name, stats)| (name.clone(), stats.clone()))
            .collect();
        artists.sort_by(|(an, a), (bn, b)| {
            b.preference_score
                .total_cmp(&a.preference_score)
                .then(b.play_count.cmp(&a.play_count))
                .then_with(|| an.cmp(bn))
        });
        artists.truncate(n);
        artists
    }

    /// Up to `n` played tracks, most recently played first.
    pub fn recent_tracks(&self, n: usize) -> Vec<(String, TrackStats)> {
        let mut tracks: Vec<_> = self
            .doc
            .tracks
            .iter()
            .filter(|(_, stats)| stats.last_played.is_some())
            .map(|(id, stats)| (id.clone(), stats.clone()))
            .collect();
        tracks.sort_by(|(a_id, a), (b_id, b)| {
            b.last_played.cmp(&a.last_played).then_with(|| a_id.cmp(b_id))
        });
        tracks.truncate(n);
        tracks
    }

    fn persist(&self) {
        let value = match serde_json::to_value(&self.doc) {
            Ok(value) => value,
            Err(e) => {
                warn!("Could not serialise listening history: {e}");
                return;
            }
        };
        if let Err(e) = self.store.save(HISTORY_NAMESPACE, &value) {
            warn!("Could not save listening history: {e:#}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn history() -> (Arc<MemoryStore>, ListeningHistory) {
        let store = Arc::new(MemoryStore::new());
        let history = ListeningHistory::load(store.clone(), HistorySettings::default());
        (store, history)
    }

    #[test]
    fn test_play_creates_entries_and_rewards_artist() {
        let (store, mut history) = history();
        let track = Track::new("t1", "Queen - Bohemian Rhapsody", "", 354);

        history.record_play_at(&track, 354.0, 1_000);

        let stats = history.track_stats("t1").unwrap();
        assert_eq!(stats.play_count, 1);
        assert_eq!(stats.last_played, Some(1_000));
        assert_eq!(stats.artist, "Queen");
        assert!((history.artist_preference("Queen") - 0.51).abs() < 1e-9);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_early_skip_penalises_late_skip_does_not() {
        let (_, mut history) = history();
        let track = Track::new("t1", "Band - Song Title", "", 200);

        history.record_skip(&track, 10.0);
        assert!((history.artist_preference("Band") - 0.48).abs() < 1e-9);

        history.record_skip(&track, 150.0);
        assert!((history.artist_preference("Band") - 0.48).abs() < 1e-9);
        assert_eq!(history.track_stats("t1").unwrap().skip_count, 2);
    }

    #[test]
    fn test_skip_with_unknown_duration_is_early() {
        let (_, mut history) = history();
        let track = Track::new("t1", "Band - Song Title", "", 0);
        history.record_skip(&track, 500.0);
        assert!(history.artist_preference("Band") < 0.5);
    }

    #[test]
    fn test_preference_is_clamped() {
        let (_, mut history) = history();
        let track = Track::new("t1", "Band - Song Title", "", 200);
        for _ in 0..40 {
            history.record_skip(&track, 0.0);
        }
        assert_eq!(history.artist_preference("Band"), 0.0);
        for _ in 0..200 {
            history.record_play_at(&track, 200.0, 0);
        }
        assert_eq!(history.artist_preference("Band"), 1.0);
    }

    #[test]
    fn test_track_score_components() {
        let (_, mut history) = history();
        let track = Track::new("t1", "Band - Song Title", "", 200).with_quality(0.6);
        let now = 100_000;

        // (0.6 + 0.5) / 2 + 0.1 for the preferred duration
        assert!((history.track_score_at(&track, now) - 0.65).abs() < 1e-9);

        let short = Track::new("t2", "Band - Jingle", "", 30).with_quality(0.6);
        assert!((history.track_score_at(&short, now) - 0.35).abs() < 1e-9);

        history.record_play_at(&track, 200.0, now - 3_600);
        let pref = history.artist_preference("Band");
        let expected = (0.6 + pref) / 2.0 + 0.1 - 0.3;
        assert!((history.track_score_at(&track, now) - expected).abs() < 1e-9);

        let expected = (0.6 + pref) / 2.0 + 0.1 - 0.1;
        assert!((history.track_score_at(&track, now + 5 * 3_600) - expected).abs() < 1e-9);
    }

    #[test]
    fn test_persistence_failure_keeps_memory_state() {
        let (store, mut history) = history();
        store.set_failing(true);
        let track = Track::new("t1", "Band - Song Title", "", 200);
        history.record_play_at(&track, 200.0, 5);
        assert_eq!(history.track_stats("t1").unwrap().play_count, 1);
        assert!(store.is_empty());
    }

    #[test]
    fn test_reload_and_newer_schema_is_ignored() {
        let store = Arc::new(MemoryStore::new());
        {
            let mut history = ListeningHistory::load(store.clone(), HistorySettings::default());
            history.record_play_at(&Track::new("t1", "Band - Song Title", "", 200), 200.0, 5);
        }
        let reloaded = ListeningHistory::load(store.clone(), HistorySettings::default());
        assert_eq!(reloaded.track_stats("t1").unwrap().play_count, 1);

        store
            .save(HISTORY_NAMESPACE, &json!({"schema_version": 99, "tracks": {}}))
            .unwrap();
        let future = ListeningHistory::load(store.clone(), HistorySettings::default());
        assert!(future.document().tracks.is_empty());
    }

    #[test]
    fn test_top_artists_and_recent_tracks() {
        let (_, mut history) = history();
        history.record_play_at(&Track::new("a", "Liked - First Song", "", 200), 200.0, 10);
        history.record_play_at(&Track::new("b", "Liked - Second Song", "", 200), 200.0, 30);
        history.record_play_at(&Track::new("c", "Meh - Third Song", "", 200), 200.0, 20);

        let top = history.top_artists(1);
        assert_eq!(top[0].0, "Liked");

        let recent: Vec<String> = history.recent_tracks(3).into_iter().map(|(id, _)| id).collect();
        assert_eq!(recent, vec!["b", "c", "a"]);
    }
}
