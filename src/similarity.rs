//! Lexical similarity and near-duplicate filtering.
//!
//! Similarity is a Jaccard index over character bigrams of normalised
//! strings. It is purely lexical: "Song (Live)" and "Song" are the same
//! track once [`crate::metadata`] has stripped the qualifier.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::metadata::NormalizedMetadata;
use crate::track::Track;

/// Title and artist similarity must both exceed these to count as a duplicate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupThresholds {
    #[serde(rename = "title_threshold")]
    pub title: f64,
    #[serde(rename = "artist_threshold")]
    pub artist: f64,
}

impl Default for DedupThresholds {
    fn default() -> Self {
        Self {
            title: 0.8,
            artist: 0.8,
        }
    }
}

impl DedupThresholds {
    fn is_duplicate(&self, title_sim: f64, artist_sim: f64) -> bool {
        title_sim > self.title && artist_sim > self.artist
    }
}

fn bigrams(s: &str) -> HashSet<(char, char)> {
    let chars: Vec<char> = s.chars().collect();
    chars.windows(2).map(|w| (w[0], w[1])).collect()
}

/// Jaccard similarity of the character-bigram sets of `a` and `b`.
///
/// Symmetric, in `[0, 1]`, and 1.0 for identical non-empty input.
///
/// ```
/// use autoqueue::similarity::string_similarity;
///
/// assert_eq!(string_similarity("night", "night"), 1.0);
/// assert_eq!(string_similarity("", "night"), 0.0);
/// assert!(string_similarity("night", "nacht") < 0.5);
/// ```
pub fn string_similarity(a: &str, b: &str) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let left = bigrams(a);
    let right = bigrams(b);
    if left.is_empty() && right.is_empty() {
        // Single characters
        return if a == b { 1.0 } else { 0.0 };
    }

    let shared = left.intersection(&right).count();
    let union = left.union(&right).count();
    shared as f64 / union as f64
}

/// Ranking similarity between two tracks' metadata.
///
/// Weighted `0.3 * title + 0.7 * artist`, except that an exact duplicate
/// (both similarities above threshold) scores 0: it adds nothing new.
pub fn track_similarity(
    a: &NormalizedMetadata,
    b: &NormalizedMetadata,
    thresholds: &DedupThresholds,
) -> f64 {
    let title_sim = string_similarity(&a.normalized_title, &b.normalized_title);
    let artist_sim = string_similarity(&a.normalized_artist, &b.normalized_artist);

    if thresholds.is_duplicate(title_sim, artist_sim) {
        0.0
    } else {
        title_sim * 0.3 + artist_sim * 0.7
    }
}

/// Incremental near-duplicate filter.
///
/// Keeps the normalised `(artist, title)` pairs it has accepted so far and
/// rejects any candidate that is a near-duplicate of one of them. The cost
/// is linear in the number of accepted signatures per check, so batches are
/// expected to stay small.
#[derive(Debug, Clone, Default)]
pub struct Deduplicator {
    thresholds: DedupThresholds,
    accepted: Vec<(String, String)>,
    exact: HashSet<String>,
}

impl Deduplicator {
    pub fn new(thresholds: DedupThresholds) -> Self {
        Self {
            thresholds,
            accepted: Vec::new(),
            exact: HashSet::new(),
        }
    }

    /// Register metadata that is already present elsewhere (queue, seeds)
    /// without checking it.
    pub fn seed(&mut self, metadata: &NormalizedMetadata) {
        if self.exact.insert(metadata.signature()) {
            self.accepted.push((
                metadata.normalized_artist.clone(),
                metadata.normalized_title.clone(),
            ));
        }
    }

    /// Whether `metadata` duplicates anything accepted or seeded so far.
    ///
    /// An exact signature match counts as similarity 1.0 on both sides, so
    /// thresholds at or above 1.0 let even identical entries through.
    pub fn is_duplicate(&self, metadata: &NormalizedMetadata) -> bool {
        if self.exact.contains(&metadata.signature()) {
            return self.thresholds.is_duplicate(1.0, 1.0);
        }

        self.accepted.iter().any(|(artist, title)| {
            let title_sim = string_similarity(&metadata.normalized_title, title);
            let artist_sim = string_similarity(&metadata.normalized_artist, artist);
            self.thresholds.is_duplicate(title_sim, artist_sim)
        })
    }

    /// Accept `metadata` unless it is a near-duplicate; returns whether it was accepted.
    pub fn accept(&mut self, metadata: &NormalizedMetadata) -> bool {
        if self.is_duplicate(metadata) {
            return false;
        }
        self.seed(metadata);
        true
    }

    pub fn len(&self) -> usize {
        self.accepted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accepted.is_empty()
    }
}

/// Keep the first of every group of near-duplicate tracks, preserving order.
pub fn dedup_tracks(tracks: Vec<Track>, thresholds: &DedupThresholds) -> Vec<Track> {
    let mut dedup = Deduplicator::new(*thresholds);
    tracks
        .into_iter()
        .filter(|track| dedup.accept(&track.metadata))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(artist: &str, title: &str) -> NormalizedMetadata {
        NormalizedMetadata::new(title, artist)
    }

    #[test]
    fn test_string_similarity_edges() {
        assert_eq!(string_similarity("", ""), 1.0);
        assert_eq!(string_similarity("a", ""), 0.0);
        assert_eq!(string_similarity("a", "a"), 1.0);
        assert_eq!(string_similarity("a", "b"), 0.0);
        assert_eq!(string_similarity("a", "ab"), 0.0);
    }

    #[test]
    fn test_string_similarity_jaccard() {
        // {ab, bc} vs {ab, bd}: 1 shared out of 3
        let sim = string_similarity("abc", "abd");
        assert!((sim - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(string_similarity("abc", "abd"), string_similarity("abd", "abc"));
    }

    #[test]
    fn test_track_similarity_duplicate_scores_zero() {
        let thresholds = DedupThresholds::default();
        let a = meta("Artist", "Song");
        let b = meta("artist", "song (Official Video)");
        assert_eq!(track_similarity(&a, &b, &thresholds), 0.0);

        // Same artist, different title: artist weight dominates
        let c = meta("Artist", "Completely Different");
        let sim = track_similarity(&a, &c, &thresholds);
        assert!(sim >= 0.7 && sim < 1.0);
    }

    #[test]
    fn test_dedup_keeps_exactly_one_of_a_pair() {
        let mut first = Track::new("1", "Artist - Song", "", 200);
        first.metadata = meta("Artist", "Song");
        let mut second = Track::new("2", "artist - song (Official Video)", "", 200);
        second.metadata = meta("artist", "song (Official Video)");

        let kept = dedup_tracks(vec![first, second], &DedupThresholds::default());
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].id, "1");
    }

    #[test]
    fn test_dedup_of_parsed_titles() {
        let tracks = vec![
            Track::new("1", "Muse - Supermassive Black Hole", "", 200),
            Track::new("2", "MUSE - Supermassive Black Hole (Official Music Video)", "", 200),
        ];
        let kept = dedup_tracks(tracks, &DedupThresholds::default());
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].id, "1");
    }

    #[test]
    fn test_dedup_keeps_distinct_tracks() {
        let tracks = vec![
            Track::new("1", "Queen - Bohemian Rhapsody", "", 354),
            Track::new("2", "Queen - Radio Ga Ga", "", 348),
            Track::new("3", "Abba - Waterloo", "", 165),
        ];
        let kept = dedup_tracks(tracks, &DedupThresholds::default());
        assert_eq!(kept.len(), 3);
    }

    #[test]
    fn test_seeded_signatures_block_candidates() {
        let mut dedup = Deduplicator::new(DedupThresholds::default());
        dedup.seed(&meta("Queen", "Bohemian Rhapsody"));
        assert!(!dedup.accept(&meta("queen", "bohemian rhapsody [HD]")));
        assert!(dedup.accept(&meta("Queen", "Radio Ga Ga")));
        assert_eq!(dedup.len(), 2);
    }

    #[test]
    fn test_thresholds_are_configurable() {
        let strict = DedupThresholds {
            title: 0.99,
            artist: 0.99,
        };
        let mut dedup = Deduplicator::new(strict);
        assert!(dedup.accept(&meta("Queen", "Bohemian Rhapsody")));
        assert!(dedup.accept(&meta("Queen", "Bohemian Rhapsodies")));
    }

    #[test]
    fn test_exact_match_respects_thresholds() {
        let mut dedup = Deduplicator::default();
        assert!(dedup.accept(&meta("Queen", "Bohemian Rhapsody")));
        assert!(!dedup.accept(&meta("Queen", "Bohemian Rhapsody")));

        let off = DedupThresholds {
            title: 1.0,
            artist: 1.0,
        };
        let mut dedup = Deduplicator::new(off);
        assert!(dedup.accept(&meta("Queen", "Bohemian Rhapsody")));
        assert!(dedup.accept(&meta("Queen", "Bohemian Rhapsody")));
        assert_eq!(dedup.len(), 1);
    }
}
