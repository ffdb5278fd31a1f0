//! Discovery context and round planning.
//!
//! Everything here is synchronous and free of I/O: the scheduler locks the
//! context, asks it for a [`RoundPlan`], and does the network work after
//! releasing the lock.

use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Instant;

use log::debug;

use crate::metadata::NormalizedMetadata;
use crate::provider::SearchStrategy;
use crate::track::Track;

/// Generic queries used before any track has been played.
pub const BOOTSTRAP_QUERIES: &[&str] = &[
    "popular songs",
    "indie rock",
    "alternative music",
    "chill music",
    "acoustic songs",
];

/// Results requested per bootstrap query.
pub const BOOTSTRAP_BATCH: usize = 3;

/// Seeds consulted when generating queries.
const RECENT_SEEDS: usize = 3;

const MAX_GENRES: usize = 3;

/// Genre keyword buckets; the first bucket with a matching keyword wins.
pub const GENRE_BUCKETS: &[(&str, &[&str])] = &[
    ("rock", &["rock", "metal", "punk"]),
    ("jazz", &["jazz", "blues", "swing"]),
    ("electronic", &["electronic", "edm", "techno", "house"]),
    ("folk", &["folk", "acoustic", "country"]),
    ("classical", &["classical", "orchestra", "symphony"]),
    ("hip hop", &["hip hop", "rap", "beats"]),
    ("indie", &["indie", "alternative"]),
];

/// Genre assumed when no bucket matches.
pub const DEFAULT_GENRE: &str = "alternative";

/// Genre bucket for a single (normalised) title.
pub fn genre_for_title(title: &str) -> &'static str {
    let title = title.to_lowercase();
    GENRE_BUCKETS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|kw| title.contains(kw)))
        .map_or(DEFAULT_GENRE, |(genre, _)| *genre)
}

/// Up to three genres by majority vote over `titles`, ties broken by
/// first appearance.
///
/// ```
/// use autoqueue::discovery::infer_genres;
///
/// let genres = infer_genres(["jazz at night", "punk rock anthem", "smooth jazz"]);
/// assert_eq!(genres, vec!["jazz", "rock"]);
/// ```
pub fn infer_genres<'a, I>(titles: I) -> Vec<&'static str>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut counts: Vec<(&'static str, usize)> = Vec::new();
    for title in titles {
        let genre = genre_for_title(title);
        match counts.iter_mut().find(|(g, _)| *g == genre) {
            Some((_, n)) => *n += 1,
            None => counts.push((genre, 1)),
        }
    }

    // Stable: equal counts keep first-seen order
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts.into_iter().take(MAX_GENRES).map(|(g, _)| g).collect()
}

/// What the next discovery round should do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoundPlan {
    /// No seeds yet: run the generic query set
    Bootstrap,
    /// Dispatch one query with one strategy
    Search { strategy: SearchStrategy, query: String },
    /// The chosen strategy produced no query
    Idle { strategy: SearchStrategy },
}

/// Seeds, discovered artists and exploration depths behind strategy choice.
#[derive(Debug, Clone)]
pub struct DiscoveryContext {
    seeds: VecDeque<Track>,
    seed_window: usize,
    discovered_artists: HashSet<String>,
    exploration_depth: HashMap<String, u32>,
    last_trigger: Option<Instant>,
}

impl DiscoveryContext {
    pub fn new(seed_window: usize) -> Self {
        Self {
            seeds: VecDeque::with_capacity(seed_window),
            seed_window: seed_window.max(1),
            discovered_artists: HashSet::new(),
            exploration_depth: HashMap::new(),
            last_trigger: None,
        }
    }

    /// Push a just-consumed track, evicting the oldest seed when full.
    pub fn add_seed(&mut self, track: Track) {
        if track.metadata.has_artist() {
            let artist = track.metadata.artist.clone();
            self.exploration_depth.entry(artist.clone()).or_insert(0);
            self.discovered_artists.insert(artist);
        }

        if self.seeds.len() == self.seed_window {
            self.seeds.pop_front();
        }
        self.seeds.push_back(track);
    }

    pub fn seeds(&self) -> impl Iterator<Item = &Track> {
        self.seeds.iter()
    }

    pub fn seed_count(&self) -> usize {
        self.seeds.len()
    }

    pub fn seed_metadata(&self) -> Vec<NormalizedMetadata> {
        self.seeds.iter().map(|t| t.metadata.clone()).collect()
    }

    pub fn discovered_artist_count(&self) -> usize {
        self.discovered_artists.len()
    }

    pub fn explored_artist_count(&self) -> usize {
        self.exploration_depth.len()
    }

    pub fn exploration_depth(&self, artist: &str) -> u32 {
        self.exploration_depth.get(artist).copied().unwrap_or(0)
    }

    /// Count one more discovery round against `artist`; returns the new depth.
    pub fn explore(&mut self, artist: &str) -> u32 {
        let depth = self.exploration_depth.entry(artist.to_string()).or_insert(0);
        *depth += 1;
        *depth
    }

    pub fn last_trigger(&self) -> Option<Instant> {
        self.last_trigger
    }

    pub fn mark_trigger(&mut self, at: Instant) {
        self.last_trigger = Some(at);
    }

    /// Forget everything, including the rate-limit timestamp.
    pub fn reset(&mut self) {
        self.seeds.clear();
        self.discovered_artists.clear();
        self.exploration_depth.clear();
        self.last_trigger = None;
    }

    /// Strategy for the next round, or `None` when there are no seeds (bootstrap).
    pub fn choose_strategy(
        &self,
        artist_depth_threshold: u32,
        related_artist_threshold: usize,
    ) -> Option<SearchStrategy> {
        let latest = self.seeds.back()?;

        if latest.metadata.has_artist()
            && self.exploration_depth(&latest.metadata.artist) < artist_depth_threshold
        {
            return Some(SearchStrategy::Artist);
        }

        if self.discovered_artists.len() < related_artist_threshold {
            Some(SearchStrategy::Related)
        } else {
            Some(SearchStrategy::Genre)
        }
    }

    /// Queries for `strategy`, built from the last three seeds (newest first).
    ///
    /// The artist strategy bumps each queried artist's exploration depth.
    pub fn generate_queries(&mut self, strategy: SearchStrategy) -> Vec<String> {
        let recent: Vec<NormalizedMetadata> = self
            .seeds
            .iter()
            .rev()
            .take(RECENT_SEEDS)
            .map(|t| t.metadata.clone())
            .collect();

        match strategy {
            SearchStrategy::Artist => recent
                .iter()
                .filter(|m| m.has_artist())
                .map(|m| {
                    self.explore(&m.artist);
                    m.artist.clone()
                })
                .collect(),
            SearchStrategy::Related => recent
                .iter()
                .filter(|m| m.has_artist())
                .map(|m| format!("artists like {}", m.artist))
                .collect(),
            SearchStrategy::Genre => infer_genres(recent.iter().map(|m| m.normalized_title.as_str()))
                .into_iter()
                .flat_map(|g| [format!("{g} music"), format!("best {g} songs"), format!("{g} playlist")])
                .collect(),
            SearchStrategy::Direct | SearchStrategy::Mixed => Vec::new(),
        }
    }

    /// Decide the next round. Only the first generated query is used.
    pub fn plan_round(&mut self, artist_depth_threshold: u32, related_artist_threshold: usize) -> RoundPlan {
        let Some(strategy) = self.choose_strategy(artist_depth_threshold, related_artist_threshold) else {
            return RoundPlan::Bootstrap;
        };

        match self.generate_queries(strategy).into_iter().next() {
            Some(query) => RoundPlan::Search { strategy, query },
            None => RoundPlan::Idle { strategy },
        }
    }

    /// Shrink the exploration map to the `keep` most explored artists once it
    /// grows past `ceiling`. Returns how many entries were evicted.
    pub fn prune_exploration(&mut self, ceiling: usize, keep: usize) -> usize {
        if self.exploration_depth.len() <= ceiling {
            return 0;
        }

        let mut entries: Vec<(String, u32)> = self.exploration_depth.drain().collect();
        entries.sort_by(|(an, ad), (bn, bd)| bd.cmp(ad).then_with(|| an.cmp(bn)));
        let evicted = entries.len().saturating_sub(keep);
        self.exploration_depth = entries.into_iter().take(keep).collect();

        debug!("Pruned exploration map, evicted {evicted} artists");
        evicted
    }
}
