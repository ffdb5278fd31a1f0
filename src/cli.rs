//! # Command-Line Interface Module
//!
//! Clap derive definitions for the `autoqueue` binary. Parsing only; the
//! wiring lives in `main.rs`.
//!
//! ## Commands
//!
//! - `metadata`: Show the artist/title split and normalised forms of a title
//! - `score`: Show the quality score of a candidate
//! - `search`: Search an offline catalog with one of the strategies
//! - `history`: Show recently played tracks or artist preferences
//! - `radio`: Simulate a listening session with background discovery
//! - `config`: Print effective settings and file locations
//!
//! ## Examples
//!
//! ```bash
//! autoqueue metadata "Radiohead - Creep (Official Video)"
//! autoqueue search "indie rock" --catalog catalog.json --strategy genre
//! RUST_LOG=autoqueue=info autoqueue radio --catalog catalog.json --seed "radiohead" --tracks 20
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::provider::SearchStrategy;
use crate::queue::ShuffleMode;
use crate::scheduler::DiscoveryRate;

/// Main application arguments structure.
#[derive(Parser, Debug)]
#[command(name = "autoqueue")]
#[command(about = "Autoqueue: a self-filling play queue with background music discovery")]
#[command(version)]
pub struct Args {
    /// Settings file to use instead of the platform default
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Directory holding the history database
    #[arg(long, global = true, value_name = "PATH")]
    pub data_dir: Option<PathBuf>,

    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Enumeration of all available subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Extract artist and title from a raw video-style title
    ///
    /// Tries "Artist - Title", "Title by Artist" and "Artist: Title" in
    /// turn, falling back to the channel name as artist.
    Metadata {
        /// Raw title, e.g. "Radiohead - Creep (Official Video)"
        title: String,

        /// Channel or uploader name
        #[arg(long)]
        channel: Option<String>,
    },

    /// Score a candidate's likely quality as a music track
    Score {
        /// Raw title
        title: String,

        /// Channel or uploader name
        #[arg(long, default_value = "")]
        channel: String,

        /// Duration in seconds (0 when unknown)
        #[arg(long, default_value_t = 0)]
        duration: i64,

        /// View count or similar popularity figure
        #[arg(long, default_value_t = 0)]
        popularity: u64,
    },

    /// Search an offline JSON catalog
    Search {
        /// Free-text query
        query: String,

        /// JSON catalog file (array of candidate records)
        #[arg(long, value_name = "FILE")]
        catalog: PathBuf,

        /// direct, artist, related, genre or mixed
        #[arg(long, default_value = "direct")]
        strategy: SearchStrategy,

        /// Maximum number of results
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },

    /// Show listening history
    History {
        /// Show artist preferences instead of recent tracks
        #[arg(long)]
        artists: bool,

        /// Number of entries to show
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },

    /// Simulate a listening session fed by background discovery
    ///
    /// Optionally seeds the queue from a catalog search, starts the
    /// discovery scheduler, then consumes tracks one by one, recording
    /// each as a full play. When the queue runs dry the session waits
    /// for discovery to catch up.
    Radio {
        /// JSON catalog file used as the search provider
        #[arg(long, value_name = "FILE")]
        catalog: PathBuf,

        /// Query used to seed the queue before starting
        #[arg(long)]
        seed: Option<String>,

        /// Shuffle mode (defaults to the configured one)
        #[arg(long)]
        mode: Option<ShuffleMode>,

        /// Discovery rate (defaults to the configured one)
        #[arg(long)]
        rate: Option<DiscoveryRate>,

        /// Number of tracks to consume
        #[arg(long, default_value_t = 10)]
        tracks: usize,
    },

    /// Print effective settings and file locations
    Config,
}
