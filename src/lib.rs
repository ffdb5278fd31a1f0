//! Self-refilling playback queue that learns from listening habits and
//! discovers new music in the background.
//!
//! Core modules:
//! - [`queue`] - Two-tier smart queue with four shuffle modes
//! - [`history`] - Listening history and artist preference model
//! - [`scheduler`] - Background discovery worker
//! - [`discovery`] - Seed window, strategy selection and query generation
//!
//! ### Supporting Modules
//!
//! - [`metadata`] - Artist/title extraction and normalisation
//! - [`quality`] - Heuristic quality scoring of candidates
//! - [`similarity`] - Bigram similarity and near-duplicate detection
//! - [`provider`] - Search provider seam, offline catalog and result cache
//! - [`store`] - Key-value persistence (SQLite or in-memory)
//! - [`track`] - Candidate records and queued tracks
//! - [`config`] - Settings file and data directory management
//! - [`cli`] - Command-line interface definitions
//!
//! ## Quick Start Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use parking_lot::Mutex;
//! use autoqueue::history::{HistorySettings, ListeningHistory};
//! use autoqueue::provider::{CachedProvider, CatalogProvider};
//! use autoqueue::queue::{ShuffleMode, SmartQueue};
//! use autoqueue::scheduler::{DiscoveryScheduler, DiscoverySettings};
//! use autoqueue::similarity::DedupThresholds;
//! use autoqueue::store::SqliteStore;
//!
//! let store = Arc::new(SqliteStore::open(&autoqueue::config::get_db_path()?)?);
//! let history = Arc::new(Mutex::new(ListeningHistory::load(store, HistorySettings::default())));
//! let queue = Arc::new(Mutex::new(SmartQueue::new(history.clone(), ShuffleMode::Smart)));
//!
//! let catalog = CatalogProvider::load(std::path::Path::new("catalog.json"))?;
//! let scheduler = DiscoveryScheduler::new(
//!     queue.clone(),
//!     Arc::new(CachedProvider::new(catalog)),
//!     DiscoverySettings::default(),
//!     DedupThresholds::default(),
//! );
//! scheduler.start()?;
//!
//! // Playback loop: pull, play, report
//! let next = queue.lock().pull_next();
//! if let Some(track) = next {
//!     history.lock().record_play(&track, f64::from(track.duration));
//!     scheduler.on_track_consumed(&track);
//! }
//!
//! scheduler.stop();
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! ## Locking
//!
//! The queue, the history and the scheduler's discovery context each sit
//! behind their own mutex. The queue lock may take the history lock (for
//! scoring) but never the other way round, and the scheduler never holds
//! the queue lock while calling the provider. Callers should release the
//! queue lock before calling [`scheduler::DiscoveryScheduler::on_track_consumed`].
//!
//! ## Error Handling
//!
//! I/O paths return `anyhow::Result` with context attached. Parsing of
//! user-facing names (shuffle mode, discovery rate, search strategy) fails
//! with a typed [`error::ConfigError`]. Persistence and provider failures
//! during normal operation are logged and never surface to the playback
//! path.

pub mod cli;
pub mod config;
pub mod discovery;
pub mod error;
pub mod history;
pub mod metadata;
pub mod provider;
pub mod quality;
pub mod queue;
pub mod scheduler;
pub mod similarity;
pub mod store;
pub mod track;
