//! # Autoqueue
//!
//! Command-line front end. This is the composition root: store, history,
//! queue, provider and scheduler are all built here and handed to each
//! other explicitly.
//!
//! ## Usage
//!
//! ```bash
//! # Inspect how a title is understood
//! autoqueue metadata "Daft Punk - Around the World (Official Audio)"
//! autoqueue score "Daft Punk - Around the World" --duration 428 --popularity 1000000
//!
//! # Search an offline catalog
//! autoqueue search "daft punk" --catalog catalog.json --strategy artist
//!
//! # Simulate a session with background discovery
//! RUST_LOG=autoqueue=info autoqueue radio --catalog catalog.json --seed "daft punk" --tracks 25
//! ```

use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use autoqueue::cli::{self, Args};
use autoqueue::config::{RuntimeConfig, Settings};
use autoqueue::history::ListeningHistory;
use autoqueue::metadata;
use autoqueue::provider::{CachedProvider, CatalogProvider, SearchProvider, SearchStrategy};
use autoqueue::quality;
use autoqueue::queue::{ShuffleMode, SmartQueue};
use autoqueue::scheduler::{DiscoveryRate, DiscoveryScheduler};
use autoqueue::store::{SqliteStore, Store};
use autoqueue::track::Track;
use clap::Parser;
use log::{debug, info, warn};
use parking_lot::Mutex;

/// How often an empty queue is polled during `radio`.
const EMPTY_QUEUE_POLL: Duration = Duration::from_millis(250);

/// How long `radio` waits on an empty queue before giving up.
const EMPTY_QUEUE_PATIENCE: Duration = Duration::from_secs(30);

/// Number of records used to seed the queue.
const SEED_LIMIT: usize = 10;

fn open_history(runtime: &RuntimeConfig, settings: &Settings) -> Result<ListeningHistory> {
    let store: Arc<dyn Store> = Arc::new(SqliteStore::open(&runtime.db_path)?);
    Ok(ListeningHistory::load(store, settings.history.clone()))
}

fn print_search(provider: &dyn SearchProvider, query: &str, strategy: SearchStrategy, limit: usize) -> Result<()> {
    let records = provider
        .search(query, strategy, limit)
        .with_context(|| format!("Search '{query}' failed"))?;

    if records.is_empty() {
        println!("No results for '{query}' ({strategy})");
        return Ok(());
    }

    println!("{} results for '{query}' ({strategy}):", records.len());
    for (i, record) in records.iter().enumerate() {
        let meta = metadata::extract(&record.title, Some(&record.channel));
        println!(
            "{:>3}. [{:.2}] {} - {} ({}s)",
            i + 1,
            record.quality_score(),
            if meta.artist.is_empty() { "?" } else { &meta.artist },
            meta.title,
            record.duration_secs()
        );
    }
    Ok(())
}

fn print_history(history: &ListeningHistory, artists: bool, limit: usize) {
    if artists {
        let top = history.top_artists(limit);
        if top.is_empty() {
            println!("No artist preferences recorded yet");
            return;
        }
        println!("{:<32} {:>10} {:>6}", "Artist", "Preference", "Plays");
        for (name, stats) in top {
            println!("{:<32} {:>10.3} {:>6}", name, stats.preference_score, stats.play_count);
        }
        return;
    }

    let recent = history.recent_tracks(limit);
    if recent.is_empty() {
        println!("No tracks played yet");
        return;
    }
    for (id, stats) in recent {
        let when = stats
            .last_played
            .and_then(|ts| chrono::DateTime::from_timestamp(ts, 0))
            .map_or_else(|| "-".to_string(), |dt| dt.format("%Y-%m-%d %H:%M").to_string());
        println!(
            "{when}  {} - {}  (plays {}, skips {}) [{id}]",
            if stats.artist.is_empty() { "?" } else { &stats.artist },
            stats.title,
            stats.play_count,
            stats.skip_count
        );
    }
}

struct RadioOptions<'a> {
    catalog: &'a Path,
    seed: Option<&'a str>,
    mode: Option<ShuffleMode>,
    rate: Option<DiscoveryRate>,
    tracks: usize,
}

fn run_radio(runtime: &RuntimeConfig, settings: &Settings, opts: RadioOptions<'_>) -> Result<()> {
    let history = Arc::new(Mutex::new(open_history(runtime, settings)?));
    let mode = opts.mode.unwrap_or(settings.queue.default_mode);
    let queue = Arc::new(Mutex::new(SmartQueue::new(Arc::clone(&history), mode)));

    let catalog = CatalogProvider::load(opts.catalog)?.with_thresholds(settings.dedup);
    info!("Loaded {} catalog records from {}", catalog.len(), opts.catalog.display());
    let provider = Arc::new(CachedProvider::new(catalog));

    if let Some(query) = opts.seed {
        let tracks: Vec<Track> = match provider.search(query, SearchStrategy::Mixed, SEED_LIMIT) {
            Ok(records) => records.iter().filter_map(Track::from_candidate).collect(),
            Err(e) => {
                warn!("Seed search '{query}' failed: {e:#}");
                Vec::new()
            }
        };
        println!("Seeded queue with {} tracks for '{query}'", tracks.len());
        queue.lock().add_tracks(tracks, true);
    }

    let mut discovery = settings.discovery.clone();
    if let Some(rate) = opts.rate {
        discovery.rate = rate;
    }
    let scheduler = DiscoveryScheduler::new(Arc::clone(&queue), provider, discovery, settings.dedup);
    scheduler.start()?;

    let mut consumed = 0;
    let mut idle_since: Option<Instant> = None;
    while consumed < opts.tracks {
        // Queue lock released before anything else is touched
        let next = queue.lock().pull_next();
        let Some(track) = next else {
            let waited = idle_since.get_or_insert_with(Instant::now).elapsed();
            if waited > EMPTY_QUEUE_PATIENCE {
                warn!("Queue stayed empty for {waited:?}, ending session early");
                break;
            }
            scheduler.trigger();
            thread::sleep(EMPTY_QUEUE_POLL);
            continue;
        };
        idle_since = None;
        consumed += 1;

        println!(
            "{consumed:>3}. {}{}",
            track,
            if track.discovered { "  [discovered]" } else { "" }
        );
        history.lock().record_play(&track, f64::from(track.duration));
        scheduler.on_track_consumed(&track);
    }

    scheduler.stop();
    let stats = scheduler.stats();
    println!();
    println!("Played {consumed} tracks ({} mode, {} discovery)", mode, stats.rate);
    println!(
        "Discovery: {} rounds, {} tracks injected, {} seeds, {} artists seen, {} explored",
        stats.rounds_completed,
        stats.tracks_injected,
        stats.seed_count,
        stats.discovered_artist_count,
        stats.explored_artist_count
    );
    println!("Queue: {} pending (target {})", stats.queue_depth, stats.target_queue_size);
    for advice in queue.lock().advice() {
        println!("  - {advice}");
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();

    let args = Args::parse();
    let runtime = RuntimeConfig::resolve(args.config.clone(), args.data_dir.clone())?;
    let settings = Settings::load(&runtime.config_path);
    debug!("Using database {} and settings {}", runtime.db_path.display(), runtime.config_path.display());

    match args.command {
        cli::Command::Metadata { title, channel } => {
            let meta = metadata::extract(&title, channel.as_deref());
            println!("Artist:            {}", meta.artist);
            println!("Title:             {}", meta.title);
            println!("Normalized artist: {}", meta.normalized_artist);
            println!("Normalized title:  {}", meta.normalized_title);
        }
        cli::Command::Score {
            title,
            channel,
            duration,
            popularity,
        } => {
            let score = quality::score_track(&title, &channel, duration, popularity);
            println!("Quality:   {score:.3}");
            println!("Long-form: {}", quality::is_long_form(&title, &channel, duration));
        }
        cli::Command::Search {
            query,
            catalog,
            strategy,
            limit,
        } => {
            let provider = CatalogProvider::load(&catalog)?.with_thresholds(settings.dedup);
            print_search(&provider, &query, strategy, limit)?;
        }
        cli::Command::History { artists, limit } => {
            let history = open_history(&runtime, &settings)?;
            print_history(&history, artists, limit);
        }
        cli::Command::Radio {
            catalog,
            seed,
            mode,
            rate,
            tracks,
        } => {
            run_radio(
                &runtime,
                &settings,
                RadioOptions {
                    catalog: &catalog,
                    seed: seed.as_deref(),
                    mode,
                    rate,
                    tracks,
                },
            )?;
        }
        cli::Command::Config => {
            println!("# Settings file: {}", runtime.config_path.display());
            println!("# Database:      {}", runtime.db_path.display());
            println!();
            print!("{}", settings.to_toml()?);
        }
    }

    Ok(())
}
