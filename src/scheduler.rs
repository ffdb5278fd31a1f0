//! # Autonomous Discovery Scheduler
//!
//! Keeps the [`SmartQueue`] topped up from a [`SearchProvider`] without ever
//! blocking the playback path.
//!
//! ## Threads
//!
//! A single background worker waits on a bounded trigger channel (capacity
//! 3) or for the health-check interval, whichever comes first. Producers
//! never wait: a trigger is dropped when the previous accepted one was less
//! than the rate's minimum interval ago, or when the channel is full (a
//! pending round already covers the need).
//!
//! ## Rounds
//!
//! Each round asks the [`DiscoveryContext`] for a plan, runs at most one
//! provider query (or the bootstrap set when nothing has been played yet),
//! filters the results by quality floor and near-duplicate detection against
//! the queue and seed window, resolves playback resources and appends the
//! survivors to the main tier. Provider failures yield an empty round.
//! Rounds run inside `catch_unwind` so the worker survives anything.
//!
//! ## Locks
//!
//! Queue and context locks are never held at the same time, and neither is
//! held across a provider call.

use std::collections::HashSet;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossbeam_channel::{bounded, select, Receiver, RecvTimeoutError, Sender, TrySendError};
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::discovery::{DiscoveryContext, RoundPlan, BOOTSTRAP_BATCH, BOOTSTRAP_QUERIES};
use crate::error::ConfigError;
use crate::provider::{SearchProvider, SearchStrategy};
use crate::queue::SmartQueue;
use crate::similarity::{DedupThresholds, Deduplicator};
use crate::track::{CandidateRecord, Track};

/// Capacity of the trigger channel.
pub const TRIGGER_CAPACITY: usize = 3;

/// Main-tier length above which the health check compacts the queue.
const COMPACT_THRESHOLD: usize = 500;

/// Discovery aggressiveness preset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscoveryRate {
    Conservative,
    #[default]
    Moderate,
    Aggressive,
}

impl DiscoveryRate {
    pub const ALL: [DiscoveryRate; 3] = [
        DiscoveryRate::Conservative,
        DiscoveryRate::Moderate,
        DiscoveryRate::Aggressive,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DiscoveryRate::Conservative => "conservative",
            DiscoveryRate::Moderate => "moderate",
            DiscoveryRate::Aggressive => "aggressive",
        }
    }

    /// The parameters this preset sets, as one unit.
    pub fn params(self) -> RateParams {
        let (low_water_mark, batch_size, interval_secs, target_queue_size) = match self {
            DiscoveryRate::Conservative => (4, 3, 15, 15),
            DiscoveryRate::Moderate => (5, 5, 10, 30),
            DiscoveryRate::Aggressive => (10, 8, 5, 50),
        };
        RateParams {
            rate: self,
            low_water_mark,
            batch_size,
            min_interval: Duration::from_secs(interval_secs),
            target_queue_size,
        }
    }
}

impl fmt::Display for DiscoveryRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DiscoveryRate {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        DiscoveryRate::ALL
            .into_iter()
            .find(|rate| rate.as_str() == wanted)
            .ok_or_else(|| ConfigError::UnknownRate(s.to_string()))
    }
}

/// Parameters governed by a [`DiscoveryRate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateParams {
    pub rate: DiscoveryRate,
    /// Seeds trigger discovery when the queue's pending count drops below this
    pub low_water_mark: usize,
    /// Results requested per round
    pub batch_size: usize,
    /// Minimum time between accepted triggers
    pub min_interval: Duration,
    pub target_queue_size: usize,
}

/// `[discovery]` section of the config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoverySettings {
    pub rate: DiscoveryRate,
    /// Candidates scoring below this are rejected
    pub quality_floor: f64,
    pub seed_window: usize,
    /// Health check triggers when the pending count drops below this
    pub critical_depth: usize,
    pub health_interval_ms: u64,
    pub join_timeout_ms: u64,
    pub exploration_ceiling: usize,
    pub exploration_keep: usize,
    pub artist_depth_threshold: u32,
    pub related_artist_threshold: usize,
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self {
            rate: DiscoveryRate::Moderate,
            quality_floor: 0.4,
            seed_window: 5,
            critical_depth: 3,
            health_interval_ms: 5_000,
            join_timeout_ms: 2_000,
            exploration_ceiling: 50,
            exploration_keep: 20,
            artist_depth_threshold: 3,
            related_artist_threshold: 10,
        }
    }
}

impl DiscoverySettings {
    pub fn health_interval(&self) -> Duration {
        Duration::from_millis(self.health_interval_ms.max(1))
    }

    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }
}

/// Why a discovery round was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerReason {
    LowQueue,
    HealthCheck,
    Manual,
}

impl fmt::Display for TriggerReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TriggerReason::LowQueue => "low queue",
            TriggerReason::HealthCheck => "health check",
            TriggerReason::Manual => "manual",
        })
    }
}

/// Snapshot returned by [`DiscoveryScheduler::stats`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiscoveryStats {
    pub running: bool,
    pub seed_count: usize,
    pub discovered_artist_count: usize,
    pub explored_artist_count: usize,
    pub queue_depth: usize,
    pub target_queue_size: usize,
    pub rounds_completed: usize,
    pub tracks_injected: usize,
    pub rate: DiscoveryRate,
}

/// State shared between the handle and the worker thread.
struct Shared {
    queue: Arc<Mutex<SmartQueue>>,
    provider: Arc<dyn SearchProvider>,
    settings: DiscoverySettings,
    thresholds: DedupThresholds,
    context: Mutex<DiscoveryContext>,
    rate: Mutex<RateParams>,
    running: AtomicBool,
    /// Serialises rounds
    round_lock: Mutex<()>,
    rounds_completed: AtomicUsize,
    tracks_injected: AtomicUsize,
    trigger_tx: Sender<TriggerReason>,
    trigger_rx: Receiver<TriggerReason>,
}

struct Worker {
    thread: JoinHandle<()>,
    shutdown_tx: Sender<()>,
    done_rx: Receiver<()>,
}

enum WorkerEvent {
    Trigger(TriggerReason),
    HealthCheck,
    Shutdown,
}

/// Handle to the background discovery service.
///
/// Stopping is cooperative and bounded by `join_timeout_ms`; dropping the
/// handle stops the worker.
pub struct DiscoveryScheduler {
    shared: Arc<Shared>,
    worker: Mutex<Option<Worker>>,
}

impl DiscoveryScheduler {
    pub fn new(
        queue: Arc<Mutex<SmartQueue>>,
        provider: Arc<dyn SearchProvider>,
        settings: DiscoverySettings,
        thresholds: DedupThresholds,
    ) -> Self {
        let (trigger_tx, trigger_rx) = bounded(TRIGGER_CAPACITY);
        let shared = Shared {
            queue,
            provider,
            context: Mutex::new(DiscoveryContext::new(settings.seed_window)),
            rate: Mutex::new(settings.rate.params()),
            settings,
            thresholds,
            running: AtomicBool::new(false),
            round_lock: Mutex::new(()),
            rounds_completed: AtomicUsize::new(0),
            tracks_injected: AtomicUsize::new(0),
            trigger_tx,
            trigger_rx,
        };

        Self {
            shared: Arc::new(shared),
            worker: Mutex::new(None),
        }
    }

    /// Spawn the worker. Calling it while running is a no-op.
    ///
    /// # Errors
    ///
    /// Fails only if the OS refuses to spawn the thread.
    pub fn start(&self) -> Result<()> {
        let mut worker = self.worker.lock();
        if worker.is_some() {
            debug!("Discovery scheduler already running");
            return Ok(());
        }

        self.shared.running.store(true, Ordering::SeqCst);
        let (shutdown_tx, shutdown_rx) = bounded(1);
        let (done_tx, done_rx) = bounded(1);
        let shared = Arc::clone(&self.shared);

        let spawned = thread::Builder::new()
            .name("autoqueue-discovery".to_string())
            .spawn(move || worker_loop(&shared, &shutdown_rx, &done_tx));

        let thread = match spawned {
            Ok(thread) => thread,
            Err(e) => {
                self.shared.running.store(false, Ordering::SeqCst);
                return Err(e).context("Failed to spawn discovery worker");
            }
        };

        *worker = Some(Worker {
            thread,
            shutdown_tx,
            done_rx,
        });
        info!("Discovery scheduler started ({} rate)", self.shared.rate.lock().rate);
        Ok(())
    }

    /// Ask the worker to exit and wait for it, at most `join_timeout_ms`.
    ///
    /// A worker still busy after the timeout is detached; it exits on its
    /// own once its round finishes.
    pub fn stop(&self) {
        self.shared.running.store(false, Ordering::SeqCst);
        let Some(worker) = self.worker.lock().take() else {
            return;
        };

        // Full or disconnected both mean the worker will notice
        let _ = worker.shutdown_tx.try_send(());

        let timeout = self.shared.settings.join_timeout();
        match worker.done_rx.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if worker.thread.join().is_err() {
                    error!("Discovery worker panicked while stopping");
                }
                info!("Discovery scheduler stopped");
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!("Discovery worker did not stop within {timeout:?}; detaching it");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    /// Report a consumed track: it joins the seed window, and a trigger is
    /// requested when the queue is below the low-water mark.
    ///
    /// Must not be called while holding the queue lock.
    pub fn on_track_consumed(&self, track: &Track) {
        self.shared.context.lock().add_seed(track.clone());

        let depth = self.shared.queue.lock().pending();
        let low_water_mark = self.shared.rate.lock().low_water_mark;
        if depth < low_water_mark {
            self.shared.try_trigger(TriggerReason::LowQueue);
        }
    }

    /// Request a round through the rate-limited path. Returns whether the
    /// trigger was enqueued.
    pub fn trigger(&self) -> bool {
        self.shared.try_trigger(TriggerReason::Manual)
    }

    /// Forget seeds, artists and exploration depths, and drop pending triggers.
    pub fn reset_context(&self) {
        self.shared.context.lock().reset();
        let dropped = self.shared.trigger_rx.try_iter().count();
        info!("Discovery context reset ({dropped} pending triggers dropped)");
    }

    /// Switch rate preset; all its parameters change together.
    pub fn set_rate(&self, rate: DiscoveryRate) {
        *self.shared.rate.lock() = rate.params();
        info!("Discovery rate set to {rate}");
    }

    pub fn rate(&self) -> RateParams {
        *self.shared.rate.lock()
    }

    /// Triggers waiting in the channel.
    pub fn pending_triggers(&self) -> usize {
        self.shared.trigger_rx.len()
    }

    /// Run one round on the calling thread, bypassing the trigger channel.
    /// Returns the number of tracks injected.
    pub fn discover_now(&self) -> usize {
        self.shared.run_round(TriggerReason::Manual)
    }

    pub fn stats(&self) -> DiscoveryStats {
        let (seed_count, discovered_artist_count, explored_artist_count) = {
            let ctx = self.shared.context.lock();
            (
                ctx.seed_count(),
                ctx.discovered_artist_count(),
                ctx.explored_artist_count(),
            )
        };
        let queue_depth = self.shared.queue.lock().pending();
        let rate = *self.shared.rate.lock();

        DiscoveryStats {
            running: self.is_running(),
            seed_count,
            discovered_artist_count,
            explored_artist_count,
            queue_depth,
            target_queue_size: rate.target_queue_size,
            rounds_completed: self.shared.rounds_completed.load(Ordering::SeqCst),
            tracks_injected: self.shared.tracks_injected.load(Ordering::SeqCst),
            rate: rate.rate,
        }
    }
}

impl Drop for DiscoveryScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

fn worker_loop(shared: &Shared, shutdown_rx: &Receiver<()>, done_tx: &Sender<()>) {
    info!("Discovery worker started");

    while shared.running.load(Ordering::SeqCst) {
        let event = select! {
            recv(shared.trigger_rx) -> msg => msg.map_or(WorkerEvent::Shutdown, WorkerEvent::Trigger),
            recv(shutdown_rx) -> _ => WorkerEvent::Shutdown,
            default(shared.settings.health_interval()) => WorkerEvent::HealthCheck,
        };

        match event {
            WorkerEvent::Trigger(reason) => {
                if !shared.running.load(Ordering::SeqCst) {
                    break;
                }
                shared.guarded("discovery round", || {
                    shared.run_round(reason);
                });
            }
            WorkerEvent::HealthCheck => shared.guarded("health check", || shared.health_check()),
            WorkerEvent::Shutdown => break,
        }
    }

    info!("Discovery worker exiting");
    let _ = done_tx.send(());
}

impl Shared {
    /// Run `f`, logging instead of unwinding if it panics.
    fn guarded<F: FnOnce()>(&self, what: &str, f: F) {
        if let Err(panic) = panic::catch_unwind(AssertUnwindSafe(f)) {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            error!("Unexpected failure in {what}: {message}");
        }
    }

    fn try_trigger(&self, reason: TriggerReason) -> bool {
        let min_interval = self.rate.lock().min_interval;
        let mut ctx = self.context.lock();
        let now = Instant::now();

        if let Some(last) = ctx.last_trigger() {
            if now.duration_since(last) < min_interval {
                debug!("Trigger ({reason}) dropped: rate limited");
                return false;
            }
        }

        match self.trigger_tx.try_send(reason) {
            Ok(()) => {
                ctx.mark_trigger(now);
                debug!("Trigger ({reason}) enqueued");
                true
            }
            Err(TrySendError::Full(_)) => {
                debug!("Trigger ({reason}) dropped: round already pending");
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    fn health_check(&self) {
        let (pending, main_len) = {
            let queue = self.queue.lock();
            (queue.pending(), queue.main_tracks().len())
        };

        if pending < self.settings.critical_depth {
            self.try_trigger(TriggerReason::HealthCheck);
        }

        self.context
            .lock()
            .prune_exploration(self.settings.exploration_ceiling, self.settings.exploration_keep);

        if main_len > COMPACT_THRESHOLD {
            let dropped = self.queue.lock().compact();
            debug!("Compacted queue, dropped {dropped} played tracks");
        }
    }

    fn run_round(&self, reason: TriggerReason) -> usize {
        let _round = self.round_lock.lock();

        let plan = self.context.lock().plan_round(
            self.settings.artist_depth_threshold,
            self.settings.related_artist_threshold,
        );
        let batch_size = self.rate.lock().batch_size;

        let candidates = match &plan {
            RoundPlan::Bootstrap => self.bootstrap_candidates(),
            RoundPlan::Search { strategy, query } => {
                match self.provider.search(query, *strategy, batch_size) {
                    Ok(mut records) => {
                        records.truncate(batch_size);
                        records
                    }
                    Err(e) => {
                        warn!("Discovery search '{query}' ({strategy}) failed: {e:#}");
                        Vec::new()
                    }
                }
            }
            RoundPlan::Idle { strategy } => {
                debug!("No query for {strategy} strategy this round");
                Vec::new()
            }
        };

        let accepted = self.accept(candidates);
        let count = accepted.len();
        if count > 0 {
            self.queue.lock().add_tracks(accepted, false);
        }

        self.rounds_completed.fetch_add(1, Ordering::SeqCst);
        self.tracks_injected.fetch_add(count, Ordering::SeqCst);

        match &plan {
            RoundPlan::Bootstrap => info!("Discovery ({reason}): bootstrap, accepted {count}"),
            RoundPlan::Search { strategy, query } => {
                info!("Discovery ({reason}): {strategy} '{query}', accepted {count}");
            }
            RoundPlan::Idle { strategy } => info!("Discovery ({reason}): {strategy}, nothing to search"),
        }
        count
    }

    fn bootstrap_candidates(&self) -> Vec<CandidateRecord> {
        let mut candidates = Vec::new();
        for query in BOOTSTRAP_QUERIES {
            match self.provider.search(query, SearchStrategy::Mixed, BOOTSTRAP_BATCH) {
                Ok(records) => candidates.extend(records.into_iter().take(BOOTSTRAP_BATCH)),
                Err(e) => warn!("Bootstrap search '{query}' failed: {e:#}"),
            }
        }
        candidates
    }

    /// Quality floor, near-duplicate filter against queue and seeds, then
    /// playback resolution. Returns the survivors tagged as discovered.
    fn accept(&self, candidates: Vec<CandidateRecord>) -> Vec<Track> {
        if candidates.is_empty() {
            return Vec::new();
        }

        let mut ids: HashSet<String> = HashSet::new();
        let mut dedup = Deduplicator::new(self.thresholds);
        {
            let queue = self.queue.lock();
            for track in queue.priority_tracks().chain(queue.main_tracks()) {
                ids.insert(track.id.clone());
                dedup.seed(&track.metadata);
            }
        }
        {
            let ctx = self.context.lock();
            for track in ctx.seeds() {
                ids.insert(track.id.clone());
                dedup.seed(&track.metadata);
            }
        }

        let mut accepted = Vec::new();
        for record in candidates {
            let Some(mut track) = Track::from_candidate(&record) else {
                debug!("Dropping candidate without id: '{}'", record.title);
                continue;
            };
            if track.quality_score < self.settings.quality_floor {
                debug!("Rejected '{}' (quality {:.2})", track.title, track.quality_score);
                continue;
            }
            if ids.contains(&track.id) || dedup.is_duplicate(&track.metadata) {
                debug!("Rejected duplicate '{}'", track.title);
                continue;
            }

            match self.provider.resolve_playback_resource(&track.id) {
                Ok(Some(locator)) => track.locator = Some(locator),
                Ok(None) => {
                    debug!("No playback resource for '{}'", track.title);
                    continue;
                }
                Err(e) => {
                    warn!("Resolving '{}' failed: {e:#}", track.id);
                    continue;
                }
            }

            ids.insert(track.id.clone());
            dedup.seed(&track.metadata);
            track.discovered = true;
            accepted.push(track);
        }
        accepted
    }
}
