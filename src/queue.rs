//! # Smart Queue
//!
//! The mutable playback queue shared by the playback path and the discovery
//! worker.
//!
//! ## Layout
//!
//! - **Priority tier**: strict FIFO of one-shot tracks ("play next"),
//!   always drained before anything else.
//! - **Main tier**: ordered tracks, picked according to the [`ShuffleMode`].
//!   Entries stay in the tier after they are pulled; the session's played
//!   set decides what is still eligible.
//! - **Played set**: ids returned by [`SmartQueue::pull_next`] this session.
//!
//! ## Modes
//!
//! - `sequential`: walk the main tier with a cursor, exhausting once.
//! - `random`: uniform pick among unplayed entries.
//! - `smart`: rank unplayed entries by listening history, penalise the
//!   artist that just played, then draw from the top third weighted by score.
//! - `mood`: picks the next track like `smart`, but never reorders the tier.
//!
//! Inserting into the main tier in smart mode spreads same-artist runs
//! apart (see [`SmartQueue::reshuffle`]). Mood mode leaves insertion order
//! alone.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use log::debug;
use parking_lot::Mutex;
use rand::distributions::WeightedIndex;
use rand::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::history::ListeningHistory;
use crate::track::Track;

/// Score penalty for sharing the artist of the last pulled track.
pub const SAME_ARTIST_PENALTY: f64 = 0.2;

/// Chance per interleave step of placing an artist-less track.
const NO_ARTIST_INTERLEAVE_CHANCE: f64 = 0.2;

/// Reshuffling fewer entries than this is pointless.
const MIN_RESHUFFLE_LEN: usize = 3;

const LOW_VARIETY_RATIO: f64 = 0.3;
const RUNNING_LOW_LEN: usize = 10;
const TOO_LONG_LEN: usize = 100;
const LOW_QUALITY_AVERAGE: f64 = 0.4;

/// How the main tier is consumed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShuffleMode {
    #[default]
    Smart,
    Random,
    Sequential,
    /// Smart selection without the reshuffle on insert
    Mood,
}

impl ShuffleMode {
    pub const ALL: [ShuffleMode; 4] = [
        ShuffleMode::Smart,
        ShuffleMode::Random,
        ShuffleMode::Sequential,
        ShuffleMode::Mood,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ShuffleMode::Smart => "smart",
            ShuffleMode::Random => "random",
            ShuffleMode::Sequential => "sequential",
            ShuffleMode::Mood => "mood",
        }
    }

    /// Only smart mode reorganises the main tier on insert or mode switch.
    fn reshuffles(self) -> bool {
        self == ShuffleMode::Smart
    }
}

impl fmt::Display for ShuffleMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ShuffleMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        ShuffleMode::ALL
            .into_iter()
            .find(|mode| mode.as_str() == wanted)
            .ok_or_else(|| ConfigError::UnknownShuffleMode(s.to_string()))
    }
}

/// Where [`SmartQueue::add_track`] places a single track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertPosition {
    /// Front of the tier (at the cursor in sequential mode)
    Next,
    End,
    /// Uniform slot in the main tier; same as `End` for the priority tier
    Random,
}

/// `[queue]` section of the config file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueSettings {
    pub default_mode: ShuffleMode,
}

/// Snapshot returned by [`SmartQueue::info`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueInfo {
    pub total: usize,
    pub priority_count: usize,
    pub main_count: usize,
    pub played_count: usize,
    /// Tracks that `pull_next` can still return
    pub pending: usize,
    pub mode: ShuffleMode,
}

/// Observations about the main tier, for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueAdvice {
    Empty,
    LowVariety,
    RunningLow,
    TooLong,
    LowQuality,
    Healthy,
}

impl fmt::Display for QueueAdvice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            QueueAdvice::Empty => "queue is empty, search for something to get started",
            QueueAdvice::LowVariety => "low artist variety, consider mixing in other artists",
            QueueAdvice::RunningLow => "queue is running low",
            QueueAdvice::TooLong => "queue is very long, consider clearing played tracks",
            QueueAdvice::LowQuality => "average track quality is low",
            QueueAdvice::Healthy => "queue looks healthy",
        };
        f.write_str(text)
    }
}

/// Two-tier playback queue. Share it as `Arc<Mutex<SmartQueue>>`.
pub struct SmartQueue {
    history: Arc<Mutex<ListeningHistory>>,
    priority: VecDeque<Track>,
    main: Vec<Track>,
    played: HashSet<String>,
    cursor: usize,
    mode: ShuffleMode,
    last_played: Option<Track>,
}

impl fmt::Debug for SmartQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmartQueue")
            .field("priority", &self.priority.len())
            .field("main", &self.main.len())
            .field("played", &self.played.len())
            .field("cursor", &self.cursor)
            .field("mode", &self.mode)
            .finish()
    }
}

impl SmartQueue {
    pub fn new(history: Arc<Mutex<ListeningHistory>>, mode: ShuffleMode) -> Self {
        Self {
            history,
            priority: VecDeque::new(),
            main: Vec::new(),
            played: HashSet::new(),
            cursor: 0,
            mode,
            last_played: None,
        }
    }

    pub fn history(&self) -> &Arc<Mutex<ListeningHistory>> {
        &self.history
    }

    pub fn mode(&self) -> ShuffleMode {
        self.mode
    }

    pub fn last_played(&self) -> Option<&Track> {
        self.last_played.as_ref()
    }

    /// Append `tracks` to the priority or main tier.
    pub fn add_tracks<I>(&mut self, tracks: I, priority: bool)
    where
        I: IntoIterator<Item = Track>,
    {
        if priority {
            self.priority.extend(tracks);
        } else {
            let before = self.main.len();
            self.main.extend(tracks);
            if self.main.len() > before {
                self.after_main_insert();
            }
        }
    }

    /// Insert one track at `position`.
    pub fn add_track(&mut self, track: Track, priority: bool, position: InsertPosition) {
        if priority {
            match position {
                InsertPosition::Next => self.priority.push_front(track),
                InsertPosition::End | InsertPosition::Random => self.priority.push_back(track),
            }
            return;
        }

        match position {
            InsertPosition::Next if self.mode == ShuffleMode::Sequential => {
                let at = self.cursor.min(self.main.len());
                self.main.insert(at, track);
            }
            InsertPosition::Next => {
                self.main.insert(0, track);
                // Keep the cursor on the same upcoming entry
                if self.cursor > 0 {
                    self.cursor += 1;
                }
            }
            InsertPosition::End => self.main.push(track),
            InsertPosition::Random => {
                let at = thread_rng().gen_range(0..=self.main.len());
                self.main.insert(at, track);
                if at < self.cursor {
                    self.cursor += 1;
                }
            }
        }
        self.after_main_insert();
    }

    fn after_main_insert(&mut self) {
        if self.mode.reshuffles() {
            self.reshuffle();
        }
    }

    /// Next track to play, or `None` when nothing is eligible. Never blocks.
    pub fn pull_next(&mut self) -> Option<Track> {
        let track = match self.priority.pop_front() {
            Some(track) => track,
            None => match self.mode {
                ShuffleMode::Sequential => self.next_sequential()?,
                ShuffleMode::Random => self.next_random()?,
                ShuffleMode::Smart | ShuffleMode::Mood => self.next_smart()?,
            },
        };

        self.played.insert(track.id.clone());
        self.last_played = Some(track.clone());
        Some(track)
    }

    fn next_sequential(&mut self) -> Option<Track> {
        let track = self.main.get(self.cursor)?.clone();
        self.cursor += 1;
        Some(track)
    }

    fn unplayed(&self) -> impl Iterator<Item = &Track> {
        self.main.iter().filter(|t| !self.played.contains(&t.id))
    }

    fn next_random(&self) -> Option<Track> {
        let available: Vec<&Track> = self.unplayed().collect();
        available.choose(&mut thread_rng()).map(|t| (*t).clone())
    }

    fn next_smart(&self) -> Option<Track> {
        let mut scored: Vec<(&Track, f64)> = {
            let history = self.history.lock();
            self.unplayed()
                .map(|track| {
                    let mut score = history.track_score(track);
                    if self.last_played.as_ref().is_some_and(|last| last.shares_artist_with(track)) {
                        score -= SAME_ARTIST_PENALTY;
                    }
                    (track, score)
                })
                .collect()
        };
        if scored.is_empty() {
            return None;
        }

        // Stable sort keeps tier order among equal scores
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        let top = &scored[..(scored.len() / 3).max(1)];

        let weights = top.iter().map(|(_, score)| score.max(0.0));
        let pick = match WeightedIndex::new(weights) {
            Ok(dist) => dist.sample(&mut thread_rng()),
            // All weights zero
            Err(_) => 0,
        };
        Some(top[pick].0.clone())
    }

    /// Spread same-artist runs across the upcoming part of the main tier.
    ///
    /// Entries before the cursor stay where they are. The rest are grouped
    /// by artist (each group shuffled), then rebuilt by repeatedly popping
    /// the head of a random non-empty group. Artist-less tracks are slotted
    /// in with a 20% chance per step, and unconditionally once the groups
    /// run dry.
    pub fn reshuffle(&mut self) {
        let start = self.cursor.min(self.main.len());
        if self.main.len() - start < MIN_RESHUFFLE_LEN {
            return;
        }

        let mut rng = thread_rng();
        let mut order: Vec<String> = Vec::new();
        let mut groups: HashMap<String, VecDeque<Track>> = HashMap::new();
        let mut no_artist: VecDeque<Track> = VecDeque::new();

        for track in self.main.drain(start..) {
            if track.metadata.has_artist() {
                let artist = track.metadata.artist.clone();
                groups
                    .entry(artist.clone())
                    .or_insert_with(|| {
                        order.push(artist);
                        VecDeque::new()
                    })
                    .push_back(track);
            } else {
                no_artist.push_back(track);
            }
        }

        for group in groups.values_mut() {
            group.make_contiguous().shuffle(&mut rng);
        }

        let mut shuffled = Vec::with_capacity(groups.values().map(VecDeque::len).sum::<usize>() + no_artist.len());
        while !order.is_empty() || !no_artist.is_empty() {
            if !order.is_empty() {
                let slot = rng.gen_range(0..order.len());
                if let Some(group) = groups.get_mut(&order[slot]) {
                    if let Some(track) = group.pop_front() {
                        shuffled.push(track);
                    }
                    if group.is_empty() {
                        groups.remove(&order[slot]);
                        order.remove(slot);
                    }
                }
            }

            if !no_artist.is_empty() && (order.is_empty() || rng.gen_bool(NO_ARTIST_INTERLEAVE_CHANCE)) {
                if let Some(track) = no_artist.pop_front() {
                    shuffled.push(track);
                }
            }
        }

        let count = shuffled.len();
        self.main.extend(shuffled);
        debug!("Reshuffled {count} upcoming main-tier tracks");
    }

    /// Switch mode. Switching to smart reshuffles the main tier.
    pub fn set_mode(&mut self, mode: ShuffleMode) {
        self.mode = mode;
        if mode.reshuffles() {
            self.reshuffle();
        }
    }

    fn pending_main(&self) -> usize {
        match self.mode {
            ShuffleMode::Sequential => self.main.len().saturating_sub(self.cursor),
            _ => self.unplayed().count(),
        }
    }

    /// Tracks `pull_next` can still return.
    pub fn pending(&self) -> usize {
        self.priority.len() + self.pending_main()
    }

    pub fn info(&self) -> QueueInfo {
        QueueInfo {
            total: self.priority.len() + self.main.len(),
            priority_count: self.priority.len(),
            main_count: self.main.len(),
            played_count: self.played.len(),
            pending: self.pending(),
            mode: self.mode,
        }
    }

    /// Remove the first track with `id` from either tier.
    pub fn remove(&mut self, id: &str) -> bool {
        if let Some(i) = self.priority.iter().position(|t| t.id == id) {
            self.priority.remove(i);
            return true;
        }

        if let Some(i) = self.main.iter().position(|t| t.id == id) {
            self.main.remove(i);
            if i < self.cursor {
                self.cursor -= 1;
            }
            return true;
        }

        false
    }

    /// Move a main-tier track to `index` (clamped to the tier length).
    ///
    /// The cursor stays on the same upcoming entry, unless the moved track is
    /// the one under the cursor: then the cursor lands on the entry that
    /// followed it, so moving it before the cursor skips it in sequential
    /// mode.
    pub fn move_track(&mut self, id: &str, index: usize) -> bool {
        let Some(old) = self.main.iter().position(|t| t.id == id) else {
            return false;
        };

        let track = self.main.remove(old);
        if old < self.cursor {
            self.cursor -= 1;
        }

        let new = index.min(self.main.len());
        self.main.insert(new, track);
        if new <= self.cursor {
            self.cursor += 1;
        }
        true
    }

    /// Forget what was played this session; the tiers are untouched.
    pub fn clear_session(&mut self) {
        self.played.clear();
        self.cursor = 0;
        self.last_played = None;
    }

    /// Empty both tiers and the session.
    pub fn clear(&mut self) {
        self.priority.clear();
        self.main.clear();
        self.clear_session();
    }

    /// Drop played main-tier entries, keeping the cursor on the same upcoming entry.
    ///
    /// Returns how many entries were dropped.
    pub fn compact(&mut self) -> usize {
        let before = self.main.len();
        let cursor = self.cursor;
        let played = &self.played;

        let mut kept_before_cursor = 0;
        let mut index = 0;
        self.main.retain(|track| {
            let keep = !played.contains(&track.id);
            if keep && index < cursor {
                kept_before_cursor += 1;
            }
            index += 1;
            keep
        });
        self.cursor = kept_before_cursor;

        before - self.main.len()
    }

    /// Priority tier followed by the main tier.
    pub fn tracks(&self) -> Vec<Track> {
        self.priority.iter().chain(self.main.iter()).cloned().collect()
    }

    pub fn main_tracks(&self) -> &[Track] {
        &self.main
    }

    pub fn priority_tracks(&self) -> impl Iterator<Item = &Track> {
        self.priority.iter()
    }

    pub fn advice(&self) -> Vec<QueueAdvice> {
        if self.main.is_empty() {
            return vec![QueueAdvice::Empty];
        }

        let count = self.main.len();
        let artists: HashSet<&str> = self
            .main
            .iter()
            .filter(|t| t.metadata.has_artist())
            .map(|t| t.metadata.artist.as_str())
            .collect();
        let avg_quality = self.main.iter().map(|t| t.quality_score).sum::<f64>() / count as f64;

        let mut advice = Vec::new();
        if (artists.len() as f64) / (count as f64) < LOW_VARIETY_RATIO {
            advice.push(QueueAdvice::LowVariety);
        }
        if count < RUNNING_LOW_LEN {
            advice.push(QueueAdvice::RunningLow);
        } else if count > TOO_LONG_LEN {
            advice.push(QueueAdvice::TooLong);
        }
        if avg_quality < LOW_QUALITY_AVERAGE {
            advice.push(QueueAdvice::LowQuality);
        }
        if advice.is_empty() {
            advice.push(QueueAdvice::Healthy);
        }
        advice
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::HistorySettings;
    use crate::store::MemoryStore;

    fn queue(mode: ShuffleMode) -> SmartQueue {
        let history = ListeningHistory::load(Arc::new(MemoryStore::new()), HistorySettings::default());
        SmartQueue::new(Arc::new(Mutex::new(history)), mode)
    }

    fn tracks(n: usize) -> Vec<Track> {
        (0..n)
            .map(|i| Track::new(&format!("t{i}"), &format!("Artist{i} - Song {i}"), "", 200))
            .collect()
    }

    fn ids(tracks: &[Track]) -> Vec<String> {
        tracks.iter().map(|t| t.id.clone()).collect()
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("Smart".parse::<ShuffleMode>().unwrap(), ShuffleMode::Smart);
        assert_eq!(" mood ".parse::<ShuffleMode>().unwrap(), ShuffleMode::Mood);
        assert_eq!(
            "loud".parse::<ShuffleMode>(),
            Err(ConfigError::UnknownShuffleMode("loud".to_string()))
        );
        for mode in ShuffleMode::ALL {
            assert_eq!(mode.to_string().parse::<ShuffleMode>().unwrap(), mode);
        }
    }

    #[test]
    fn test_priority_tier_is_fifo_and_first() {
        let mut q = queue(ShuffleMode::Sequential);
        q.add_tracks(tracks(2), false);
        q.add_tracks(vec![Track::new("p1", "P - One", "", 200), Track::new("p2", "P - Two", "", 200)], true);

        let order: Vec<String> = std::iter::from_fn(|| q.pull_next()).map(|t| t.id).collect();
        assert_eq!(order, vec!["p1", "p2", "t0", "t1"]);
    }

    #[test]
    fn test_sequential_exhausts_once() {
        let mut q = queue(ShuffleMode::Sequential);
        q.add_tracks(tracks(5), false);

        let pulled: Vec<String> = (0..5).filter_map(|_| q.pull_next()).map(|t| t.id).collect();
        assert_eq!(pulled, ids(&tracks(5)));
        assert!(q.pull_next().is_none());
        assert_eq!(q.info().played_count, 5);
        assert_eq!(q.info().pending, 0);
    }

    #[test]
    fn test_random_never_repeats_within_session() {
        let mut q = queue(ShuffleMode::Random);
        q.add_tracks(tracks(8), false);

        let mut seen: HashSet<String> = HashSet::new();
        while let Some(track) = q.pull_next() {
            assert!(seen.insert(track.id));
        }
        assert_eq!(seen.len(), 8);

        q.clear_session();
        assert!(q.pull_next().is_some());
    }

    #[test]
    fn test_smart_pull_exhausts_unplayed_entries() {
        let mut q = queue(ShuffleMode::Smart);
        q.add_tracks(tracks(6), false);
        let mut count = 0;
        while q.pull_next().is_some() {
            count += 1;
        }
        assert_eq!(count, 6);
        assert_eq!(q.info().main_count, 6);
    }

    #[test]
    fn test_smart_zero_weights_fall_back_to_top() {
        let mut q = queue(ShuffleMode::Smart);
        q.add_tracks(vec![Track::new("z", "Z - Zero", "", 10).with_quality(0.0)], false);
        // A lone entry comes out however low it scores
        assert_eq!(q.pull_next().unwrap().id, "z");
    }

    #[test]
    fn test_reshuffle_keeps_every_track() {
        let mut q = queue(ShuffleMode::Smart);
        let mut batch: Vec<Track> = (0..6)
            .map(|i| Track::new(&format!("a{i}"), &format!("Same - Song {i}"), "", 200))
            .collect();
        batch.push(Track::new("n1", "Untitled", "", 200));
        batch.push(Track::new("o1", "Other - Thing", "", 200));
        q.add_tracks(batch.clone(), false);

        let mut before = ids(&batch);
        let mut after = ids(q.main_tracks());
        before.sort();
        after.sort();
        assert_eq!(before, after);
    }

    fn two_artist_batch() -> Vec<Track> {
        let mut batch = Vec::new();
        for i in 0..4 {
            batch.push(Track::new(&format!("a{i}"), &format!("Alpha - Long Song Title {i}"), "", 200));
        }
        for i in 0..4 {
            batch.push(Track::new(&format!("b{i}"), &format!("Bravo - Long Song Title {i}"), "", 200));
        }
        batch
    }

    fn longest_artist_run(tracks: &[Track]) -> usize {
        let mut longest = 0;
        let mut run = 0;
        for (i, track) in tracks.iter().enumerate() {
            if i > 0 && tracks[i - 1].metadata.artist == track.metadata.artist {
                run += 1;
            } else {
                run = 1;
            }
            longest = longest.max(run);
        }
        longest
    }

    #[test]
    fn test_reshuffle_separates_two_artists() {
        let mut shorter = 0;
        for _ in 0..200 {
            let mut q = queue(ShuffleMode::Sequential);
            q.add_tracks(two_artist_batch(), false);
            assert_eq!(q.main_tracks()[0].metadata.artist, "Alpha");
            assert_eq!(longest_artist_run(q.main_tracks()), 4);

            q.reshuffle();
            assert_eq!(q.main_tracks().len(), 8);
            if longest_artist_run(q.main_tracks()) < 4 {
                shorter += 1;
            }
        }
        // A run of four survives roughly a quarter of the time
        assert!(shorter >= 120, "only {shorter}/200 reshuffles broke up the runs");
    }

    #[test]
    fn test_reshuffle_leaves_entries_before_cursor() {
        for _ in 0..20 {
            let mut q = queue(ShuffleMode::Sequential);
            q.add_tracks(two_artist_batch(), false);
            q.pull_next();
            q.pull_next();

            q.reshuffle();
            let main = ids(q.main_tracks());
            assert_eq!(&main[..2], &["a0", "a1"]);

            let mut rest = main[2..].to_vec();
            rest.sort();
            assert_eq!(rest, vec!["a2", "a3", "b0", "b1", "b2", "b3"]);
        }
    }

    #[test]
    fn test_set_mode_smart_reshuffles_but_mood_does_not() {
        let mut q = queue(ShuffleMode::Random);
        q.add_tracks(two_artist_batch(), false);
        q.set_mode(ShuffleMode::Mood);
        assert_eq!(ids(q.main_tracks()), ids(&two_artist_batch()));

        let mut reordered = false;
        for _ in 0..50 {
            q.set_mode(ShuffleMode::Smart);
            reordered |= ids(q.main_tracks()) != ids(&two_artist_batch());
        }
        assert!(reordered);
    }

    #[test]
    fn test_mood_insert_keeps_order() {
        for _ in 0..50 {
            let mut q = queue(ShuffleMode::Mood);
            let batch: Vec<Track> = (0..10)
                .map(|i| Track::new(&format!("s{i}"), &format!("Same - Song Number {i}"), "", 200))
                .collect();
            q.add_tracks(batch.clone(), false);
            q.add_track(Track::new("x", "Other - Another Song", "", 200), false, InsertPosition::End);

            let mut expected = ids(&batch);
            expected.push("x".to_string());
            assert_eq!(ids(q.main_tracks()), expected);
        }
    }

    #[test]
    fn test_remove_adjusts_cursor() {
        let mut q = queue(ShuffleMode::Sequential);
        q.add_tracks(tracks(4), false);
        q.pull_next();
        q.pull_next();

        assert!(q.remove("t0"));
        assert_eq!(q.pull_next().unwrap().id, "t2");
        assert!(!q.remove("missing"));
    }

    #[test]
    fn test_move_keeps_cursor_on_same_track() {
        let mut q = queue(ShuffleMode::Sequential);
        q.add_tracks(tracks(5), false);
        q.pull_next();
        q.pull_next();
        // Cursor now points at t2

        assert!(q.move_track("t4", 0));
        assert_eq!(q.pull_next().unwrap().id, "t2");

        let mut q = queue(ShuffleMode::Sequential);
        q.add_tracks(tracks(5), false);
        q.pull_next();
        q.pull_next();
        assert!(q.move_track("t0", 10));
        assert_eq!(q.pull_next().unwrap().id, "t2");

        assert!(!q.move_track("missing", 0));
    }

    #[test]
    fn test_move_current_track_advances_cursor() {
        let mut q = queue(ShuffleMode::Sequential);
        q.add_tracks(tracks(5), false);
        q.pull_next();
        q.pull_next();
        // Cursor on t2; moving it behind the cursor skips it
        assert!(q.move_track("t2", 0));
        assert_eq!(ids(q.main_tracks()), vec!["t2", "t0", "t1", "t3", "t4"]);
        assert_eq!(q.pull_next().unwrap().id, "t3");

        let mut q = queue(ShuffleMode::Sequential);
        q.add_tracks(tracks(5), false);
        q.pull_next();
        q.pull_next();
        assert!(q.move_track("t2", 10));
        let rest: Vec<String> = std::iter::from_fn(|| q.pull_next()).map(|t| t.id).collect();
        assert_eq!(rest, vec!["t3", "t4", "t2"]);
    }

    #[test]
    fn test_add_track_positions() {
        let mut q = queue(ShuffleMode::Sequential);
        q.add_tracks(tracks(3), false);
        q.pull_next();

        q.add_track(Track::new("next", "N - Next", "", 200), false, InsertPosition::Next);
        assert_eq!(q.pull_next().unwrap().id, "next");

        q.add_track(Track::new("p", "P - P", "", 200), true, InsertPosition::Random);
        q.add_track(Track::new("pn", "P - Pn", "", 200), true, InsertPosition::Next);
        assert_eq!(q.pull_next().unwrap().id, "pn");
        assert_eq!(q.pull_next().unwrap().id, "p");
        assert_eq!(q.pull_next().unwrap().id, "t1");
    }

    #[test]
    fn test_info_and_pending() {
        let mut q = queue(ShuffleMode::Random);
        q.add_tracks(tracks(4), false);
        q.add_tracks(tracks(1), true);
        q.pull_next();
        q.pull_next();

        let info = q.info();
        assert_eq!(info.total, 4);
        assert_eq!(info.priority_count, 0);
        assert_eq!(info.played_count, 1 + 1);
        assert_eq!(info.mode, ShuffleMode::Random);
        // The priority pull shares its id with the main-tier t0
        assert_eq!(info.pending, 2);
    }

    #[test]
    fn test_compact_drops_played_and_keeps_cursor() {
        let mut q = queue(ShuffleMode::Sequential);
        q.add_tracks(tracks(5), false);
        q.pull_next();
        q.pull_next();

        assert_eq!(q.compact(), 2);
        assert_eq!(q.main_tracks().len(), 3);
        assert_eq!(q.pull_next().unwrap().id, "t2");
    }

    #[test]
    fn test_clear_empties_everything() {
        let mut q = queue(ShuffleMode::Smart);
        q.add_tracks(tracks(4), false);
        q.add_tracks(tracks(2), true);
        q.pull_next();
        q.clear();
        assert_eq!(q.info().total, 0);
        assert_eq!(q.info().played_count, 0);
        assert!(q.last_played().is_none());
        assert!(q.pull_next().is_none());
    }

    #[test]
    fn test_advice() {
        let q = queue(ShuffleMode::Smart);
        assert_eq!(q.advice(), vec![QueueAdvice::Empty]);

        let mut q = queue(ShuffleMode::Random);
        let same: Vec<Track> = (0..12)
            .map(|i| Track::new(&format!("s{i}"), &format!("Same - Song {i}"), "", 200))
            .collect();
        q.add_tracks(same, false);
        assert_eq!(q.advice(), vec![QueueAdvice::LowVariety]);

        let mut q = queue(ShuffleMode::Random);
        q.add_tracks(tracks(3), false);
        assert_eq!(q.advice(), vec![QueueAdvice::RunningLow]);

        let mut q = queue(ShuffleMode::Random);
        q.add_tracks(tracks(20), false);
        assert_eq!(q.advice(), vec![QueueAdvice::Healthy]);
    }
}
