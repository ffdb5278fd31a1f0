//! # Search Providers
//!
//! The discovery scheduler only sees the [`SearchProvider`] trait: a query
//! plus a [`SearchStrategy`] in, a list of [`CandidateRecord`]s out. Results
//! are not assumed to be ordered or clean.
//!
//! Shipped implementations:
//!
//! - [`CatalogProvider`]: offline search over a JSON catalog of records,
//!   expanding each strategy into several lexical searches.
//! - [`CachedProvider`]: wraps any provider with a bounded result cache.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use log::{debug, info};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::metadata::{self, NormalizedMetadata};
use crate::similarity::{DedupThresholds, Deduplicator};
use crate::track::CandidateRecord;

/// How a query should be interpreted by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchStrategy {
    Direct,
    Artist,
    Related,
    Genre,
    Mixed,
}

impl SearchStrategy {
    pub const ALL: [SearchStrategy; 5] = [
        SearchStrategy::Direct,
        SearchStrategy::Artist,
        SearchStrategy::Related,
        SearchStrategy::Genre,
        SearchStrategy::Mixed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SearchStrategy::Direct => "direct",
            SearchStrategy::Artist => "artist",
            SearchStrategy::Related => "related",
            SearchStrategy::Genre => "genre",
            SearchStrategy::Mixed => "mixed",
        }
    }
}

impl fmt::Display for SearchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchStrategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        SearchStrategy::ALL
            .into_iter()
            .find(|strategy| strategy.as_str() == wanted)
            .ok_or_else(|| ConfigError::UnknownStrategy(s.to_string()))
    }
}

/// External search/discovery backend.
pub trait SearchProvider: Send + Sync {
    /// Up to `limit` candidates for `query`. May be empty; may fail transiently.
    fn search(&self, query: &str, strategy: SearchStrategy, limit: usize) -> Result<Vec<CandidateRecord>>;

    /// Playback locator for a candidate id, or `None` when it cannot be played.
    fn resolve_playback_resource(&self, id: &str) -> Result<Option<String>>;
}

impl<P: SearchProvider + ?Sized> SearchProvider for Arc<P> {
    fn search(&self, query: &str, strategy: SearchStrategy, limit: usize) -> Result<Vec<CandidateRecord>> {
        (**self).search(query, strategy, limit)
    }

    fn resolve_playback_resource(&self, id: &str) -> Result<Option<String>> {
        (**self).resolve_playback_resource(id)
    }
}

/// Words ignored when matching a query against a title.
const STOP_WORDS: &[&str] = &[
    "and", "the", "a", "an", "of", "to", "in", "on", "at", "for", "with", "by",
];

/// Lexical relevance of `title` to `query` in `[0, 1]`.
///
/// An exact phrase match scores by how early it appears (`1 - pos/len`).
/// Otherwise every non-stop-word of the query must appear somewhere in the
/// title, scoring `0.8 - avg_pos/len * 0.3`. Anything else is irrelevant.
///
/// ```
/// use autoqueue::provider::relevance_score;
///
/// assert_eq!(relevance_score("queen", "Queen - Bohemian Rhapsody"), 1.0);
/// assert!(relevance_score("rhapsody queen", "Queen - Bohemian Rhapsody") > 0.5);
/// assert_eq!(relevance_score("abba", "Queen - Bohemian Rhapsody"), 0.0);
/// ```
pub fn relevance_score(query: &str, title: &str) -> f64 {
    let title = title.to_lowercase();
    let query = query.trim().to_lowercase();

    if let Some(position) = title.find(&query) {
        if title.is_empty() {
            return 1.0;
        }
        return 1.0 - position as f64 / title.len() as f64;
    }

    let words: Vec<&str> = query.split_whitespace().collect();
    let important: Vec<&str> = words
        .iter()
        .copied()
        .filter(|w| !STOP_WORDS.contains(w))
        .collect();
    let important = if important.is_empty() { words } else { important };

    let positions: Option<Vec<usize>> = important.iter().map(|w| title.find(w)).collect();
    match positions {
        Some(positions) if !positions.is_empty() => {
            let avg = positions.iter().sum::<usize>() as f64 / positions.len() as f64;
            0.8 - (avg / title.len() as f64) * 0.3
        }
        _ => 0.0,
    }
}

/// Ranking key combining relevance with quality.
fn rank_key(query: &str, entry: &CatalogEntry) -> f64 {
    relevance_score(query, &entry.record.title) * 0.95 + entry.quality * 0.05
}

#[derive(Debug, Clone)]
struct CatalogEntry {
    record: CandidateRecord,
    quality: f64,
    metadata: NormalizedMetadata,
}

/// Titles containing these are never returned by the catalog.
const EXCLUDED_TITLE_TERMS: &[&str] = &["#shorts", "reaction", "review"];

const MIN_CATALOG_DURATION: f64 = 60.0;
const MIN_CATALOG_QUALITY: f64 = 0.3;

/// Offline provider over an in-memory catalog.
#[derive(Debug, Clone)]
pub struct CatalogProvider {
    entries: Vec<CatalogEntry>,
    thresholds: DedupThresholds,
}

impl CatalogProvider {
    /// Build a catalog, dropping records without an id, clips under a
    /// minute, shorts/reactions/reviews and anything scoring 0.3 or less.
    pub fn new(records: Vec<CandidateRecord>) -> Self {
        let total = records.len();
        let entries: Vec<CatalogEntry> = records
            .into_iter()
            .filter(|r| r.id.as_deref().is_some_and(|id| !id.trim().is_empty()))
            .filter(|r| !matches!(r.duration, Some(d) if d > 0.0 && d < MIN_CATALOG_DURATION))
            .filter(|r| {
                let title = r.title.to_lowercase();
                !EXCLUDED_TITLE_TERMS.iter().any(|term| title.contains(term))
            })
            .filter_map(|record| {
                let quality = record.quality_score();
                if quality <= MIN_CATALOG_QUALITY {
                    return None;
                }
                let channel = (!record.channel.is_empty()).then_some(record.channel.as_str());
                let metadata = metadata::extract(&record.title, channel);
                Some(CatalogEntry {
                    record,
                    quality,
                    metadata,
                })
            })
            .collect();

        debug!("Catalog kept {} of {} records", entries.len(), total);
        Self {
            entries,
            thresholds: DedupThresholds::default(),
        }
    }

    /// Load a catalog from a JSON array of records.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read or is not a JSON array of records.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read catalog {}", path.display()))?;
        let records: Vec<CandidateRecord> = serde_json::from_str(&text)
            .with_context(|| format!("Catalog {} is not a JSON array of records", path.display()))?;

        let catalog = Self::new(records);
        info!("Loaded catalog {} ({} usable records)", path.display(), catalog.len());
        Ok(catalog)
    }

    pub fn with_thresholds(mut self, thresholds: DedupThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn direct(&self, query: &str, limit: usize) -> Vec<&CatalogEntry> {
        let mut hits: Vec<(&CatalogEntry, f64)> = self
            .entries
            .iter()
            .filter(|e| relevance_score(query, &e.record.title) > 0.0)
            .map(|e| (e, rank_key(query, e)))
            .collect();
        hits.sort_by(|a, b| b.1.total_cmp(&a.1));
        hits.into_iter().take(limit).map(|(e, _)| e).collect()
    }

    /// Drop entries with a repeated id or near-duplicate metadata, keeping order.
    fn unique<'a>(&self, entries: Vec<&'a CatalogEntry>) -> Vec<&'a CatalogEntry> {
        let mut dedup = Deduplicator::new(self.thresholds);
        let mut ids = std::collections::HashSet::new();
        entries
            .into_iter()
            .filter(|e| ids.insert(e.record.id.clone()) && dedup.accept(&e.metadata))
            .collect()
    }

    fn by_artist(&self, artist: &str, limit: usize) -> Vec<&CatalogEntry> {
        let per_term = (limit / 2).max(1);
        let terms = [
            artist.to_string(),
            format!("{artist} songs"),
            format!("{artist} best songs"),
            format!("{artist} top hits"),
            format!("{artist} album"),
        ];
        let hits: Vec<&CatalogEntry> = terms.iter().flat_map(|t| self.direct(t, per_term)).collect();
        let mut hits = self.unique(hits);
        hits.truncate(limit);
        hits
    }

    fn related(&self, query: &str, limit: usize) -> Vec<&CatalogEntry> {
        let seed_query = query
            .strip_prefix("artists like ")
            .unwrap_or(query)
            .trim();
        let initial = self.direct(seed_query, 5);
        let Some(best) = initial.iter().max_by(|a, b| a.quality.total_cmp(&b.quality)) else {
            return Vec::new();
        };

        let artist = best.metadata.artist.clone();
        if artist.is_empty() {
            let mut initial = initial;
            initial.truncate(limit);
            return initial;
        }

        let per_term = (limit / 3).max(1);
        let terms = [
            format!("artists like {artist}"),
            format!("{artist} similar music"),
            format!("songs similar to {seed_query}"),
        ];
        let mut all = initial.clone();
        all.extend(terms.iter().flat_map(|t| self.direct(t, per_term)));

        let mut hits = self.unique(all);
        hits.truncate(limit);
        hits
    }

    fn by_genre(&self, genre: &str, limit: usize) -> Vec<&CatalogEntry> {
        let per_term = (limit / 2).max(1);
        let terms = [
            format!("{genre} playlist"),
            format!("best {genre} songs"),
            format!("{genre} music"),
            format!("top {genre} hits"),
            genre.to_string(),
        ];
        let hits: Vec<&CatalogEntry> = terms.iter().flat_map(|t| self.direct(t, per_term)).collect();
        let mut hits = self.unique(hits);
        hits.truncate(limit);
        hits
    }

    fn mixed(&self, query: &str, limit: usize) -> Vec<&CatalogEntry> {
        let share = |weight: f64| ((limit as f64 * weight) as usize).max(1);

        let mut all = self.direct(query, share(0.4));
        all.extend(self.by_artist(query, share(0.3)));
        all.extend(self.related(query, share(0.2)));
        all.extend(self.by_genre(query, share(0.1)));

        all.sort_by(|a, b| rank_key(query, b).total_cmp(&rank_key(query, a)));
        let mut hits = self.unique(all);
        hits.truncate(limit);
        hits
    }
}

impl SearchProvider for CatalogProvider {
    fn search(&self, query: &str, strategy: SearchStrategy, limit: usize) -> Result<Vec<CandidateRecord>> {
        let hits = match strategy {
            SearchStrategy::Direct => self.direct(query, limit),
            SearchStrategy::Artist => self.by_artist(query, limit),
            SearchStrategy::Related => self.related(query, limit),
            SearchStrategy::Genre => self.by_genre(query, limit),
            SearchStrategy::Mixed => self.mixed(query, limit),
        };
        debug!("Catalog {strategy} search '{query}' -> {} hits", hits.len());
        Ok(hits.into_iter().map(|e| e.record.clone()).collect())
    }

    fn resolve_playback_resource(&self, id: &str) -> Result<Option<String>> {
        Ok(self
            .entries
            .iter()
            .find(|e| e.record.id.as_deref() == Some(id))
            .map(|e| e.record.locator.clone().unwrap_or_else(|| format!("catalog://{id}"))))
    }
}

/// Cached search results keyed by `strategy:query:limit`, oldest first.
#[derive(Debug, Default)]
struct SearchCache {
    results: HashMap<String, Vec<CandidateRecord>>,
    order: VecDeque<String>,
}

/// Bounded search-result cache in front of another provider.
///
/// When full, the ten oldest entries are evicted at once. Failed searches
/// are not cached.
pub struct CachedProvider<P> {
    inner: P,
    capacity: usize,
    cache: Mutex<SearchCache>,
}

impl<P: SearchProvider> CachedProvider<P> {
    pub const DEFAULT_CAPACITY: usize = 100;
    const EVICT_BATCH: usize = 10;

    pub fn new(inner: P) -> Self {
        Self::with_capacity(inner, Self::DEFAULT_CAPACITY)
    }

    pub fn with_capacity(inner: P, capacity: usize) -> Self {
        Self {
            inner,
            capacity: capacity.max(1),
            cache: Mutex::new(SearchCache::default()),
        }
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }

    pub fn cached_len(&self) -> usize {
        self.cache.lock().results.len()
    }
}

impl<P: SearchProvider> SearchProvider for CachedProvider<P> {
    fn search(&self, query: &str, strategy: SearchStrategy, limit: usize) -> Result<Vec<CandidateRecord>> {
        let key = format!("{strategy}:{query}:{limit}");
        if let Some(hit) = self.cache.lock().results.get(&key) {
            debug!("Search cache hit for '{key}'");
            return Ok(hit.clone());
        }

        // Not holding the lock across the inner call
        let results = self.inner.search(query, strategy, limit)?;

        let mut cache = self.cache.lock();
        if !cache.results.contains_key(&key) {
            if cache.results.len() >= self.capacity {
                for _ in 0..Self::EVICT_BATCH {
                    if let Some(oldest) = cache.order.pop_front() {
                        cache.results.remove(&oldest);
                    }
                }
            }
            cache.order.push_back(key.clone());
        }
        cache.results.insert(key, results.clone());
        Ok(results)
    }

    fn resolve_playback_resource(&self, id: &str) -> Result<Option<String>> {
        self.inner.resolve_playback_resource(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn record(id: &str, title: &str, duration: f64) -> CandidateRecord {
        CandidateRecord::new(id, title, "", duration)
    }

    fn catalog() -> CatalogProvider {
        CatalogProvider::new(vec![
            record("q1", "Queen - Bohemian Rhapsody", 354.0),
            record("q2", "Queen - Radio Ga Ga", 348.0),
            record("q3", "Queen - Bohemian Rhapsody (Official Video)", 360.0),
            record("a1", "Abba - Waterloo", 165.0),
            record("j1", "Miles Davis - So What (jazz classic)", 545.0),
            record("s1", "Queen - tiny clip", 20.0),
            record("r1", "Queen - Bohemian Rhapsody reaction", 300.0),
        ])
    }

    #[test]
    fn test_strategy_parsing() {
        assert_eq!("Genre".parse::<SearchStrategy>().unwrap(), SearchStrategy::Genre);
        assert!(matches!(
            "psychic".parse::<SearchStrategy>(),
            Err(ConfigError::UnknownStrategy(_))
        ));
    }

    #[test]
    fn test_relevance_score() {
        assert_eq!(relevance_score("", ""), 1.0);
        assert_eq!(relevance_score("x", ""), 0.0);
        // Stop words are ignored when matching word by word
        let r = relevance_score("the rhapsody of queen", "queen - bohemian rhapsody");
        assert!(r > 0.5 && r <= 0.8);
        assert_eq!(relevance_score("queen live", "queen - bohemian rhapsody"), 0.0);
    }

    #[test]
    fn test_catalog_prefilter() {
        let catalog = catalog();
        assert_eq!(catalog.len(), 5);
        assert!(catalog.resolve_playback_resource("s1").unwrap().is_none());
        assert_eq!(
            catalog.resolve_playback_resource("q1").unwrap().as_deref(),
            Some("catalog://q1")
        );
    }

    #[test]
    fn test_direct_search_ranks_and_limits() {
        let catalog = catalog();
        let hits = catalog.search("queen", SearchStrategy::Direct, 10).unwrap();
        assert_eq!(hits.len(), 3);
        assert!(hits.iter().all(|r| r.title.starts_with("Queen")));

        let hits = catalog.search("queen", SearchStrategy::Direct, 1).unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn test_artist_search_dedups_near_duplicates() {
        let catalog = catalog();
        let hits = catalog.search("Queen", SearchStrategy::Artist, 10).unwrap();
        let ids: Vec<&str> = hits.iter().filter_map(|r| r.id.as_deref()).collect();
        assert_eq!(ids.len(), 2, "got {ids:?}");
        assert!(ids.contains(&"q2"));
    }

    #[test]
    fn test_related_and_genre_search() {
        let catalog = catalog();
        let hits = catalog.search("artists like Queen", SearchStrategy::Related, 10).unwrap();
        assert!(!hits.is_empty());

        let hits = catalog.search("jazz", SearchStrategy::Genre, 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id.as_deref(), Some("j1"));

        let hits = catalog.search("nothing matches this", SearchStrategy::Mixed, 10).unwrap();
        assert!(hits.is_empty());
    }

    struct CountingProvider {
        calls: AtomicUsize,
    }

    impl SearchProvider for CountingProvider {
        fn search(&self, query: &str, _: SearchStrategy, _: usize) -> Result<Vec<CandidateRecord>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if query == "fail" {
                anyhow::bail!("transient failure");
            }
            Ok(vec![record(query, query, 200.0)])
        }

        fn resolve_playback_resource(&self, _: &str) -> Result<Option<String>> {
            Ok(None)
        }
    }

    #[test]
    fn test_cache_hits_and_eviction() {
        let cached = CachedProvider::with_capacity(
            CountingProvider {
                calls: AtomicUsize::new(0),
            },
            20,
        );

        cached.search("a", SearchStrategy::Direct, 5).unwrap();
        cached.search("a", SearchStrategy::Direct, 5).unwrap();
        assert_eq!(cached.inner().calls.load(Ordering::SeqCst), 1);

        // Different limit is a different key
        cached.search("a", SearchStrategy::Direct, 6).unwrap();
        assert_eq!(cached.inner().calls.load(Ordering::SeqCst), 2);

        assert!(cached.search("fail", SearchStrategy::Direct, 5).is_err());
        assert_eq!(cached.cached_len(), 2);

        for i in 0..30 {
            cached.search(&format!("q{i}"), SearchStrategy::Direct, 5).unwrap();
        }
        assert!(cached.cached_len() <= 20);

        // The oldest key was evicted
        let before = cached.inner().calls.load(Ordering::SeqCst);
        cached.search("a", SearchStrategy::Direct, 5).unwrap();
        assert_eq!(cached.inner().calls.load(Ordering::SeqCst), before + 1);
    }
}
