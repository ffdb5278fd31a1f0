//! # Configuration Module
//!
//! Settings file handling and data directory setup for Autoqueue.
//!
//! ## Locations
//!
//! The settings file lives in the platform config directory and the
//! history database in the platform data directory:
//!
//! - Linux: `~/.config/autoqueue/config.toml`, `~/.local/share/autoqueue/autoqueue.db`
//! - macOS: `~/Library/Application Support/autoqueue/`
//! - Windows: `%APPDATA%\autoqueue\`
//!
//! Both can be overridden from the command line.
//!
//! ## Settings file
//!
//! Every key is optional. A missing file means defaults; a malformed one is
//! reported with a warning and also means defaults.
//!
//! ```toml
//! [history]
//! preferred_duration_min = 120
//! preferred_duration_max = 360
//!
//! [queue]
//! default_mode = "smart"
//!
//! [discovery]
//! rate = "aggressive"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::history::HistorySettings;
use crate::queue::QueueSettings;
use crate::scheduler::DiscoverySettings;
use crate::similarity::DedupThresholds;

/// Subdirectory name used under the platform directories.
pub const APP_DIR: &str = "autoqueue";

const DB_FILE: &str = "autoqueue.db";
const CONFIG_FILE: &str = "config.toml";

fn ensure_dir(dir: PathBuf) -> Result<PathBuf> {
    fs::create_dir_all(&dir).with_context(|| {
        format!(
            "Failed to create Autoqueue directory at {}. Please check file permissions.",
            dir.display()
        )
    })?;
    Ok(dir)
}

/// Returns the platform-appropriate data directory, creating it if needed.
///
/// # Errors
///
/// Fails if the platform has no data directory or it cannot be created.
pub fn get_data_dir() -> Result<PathBuf> {
    let base = dirs::data_dir().ok_or_else(|| {
        anyhow::anyhow!(
            "Could not determine system data directory. Please ensure your platform supports standard data directories."
        )
    })?;
    ensure_dir(base.join(APP_DIR))
}

/// Path of the history database inside `data_dir` (created if needed).
pub fn db_path_in(data_dir: &Path) -> Result<PathBuf> {
    Ok(ensure_dir(data_dir.to_path_buf())?.join(DB_FILE))
}

/// Returns the platform-appropriate database file path.
///
/// ```no_run
/// use autoqueue::config::get_db_path;
///
/// let db_path = get_db_path()?;
/// println!("Database location: {}", db_path.display());
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn get_db_path() -> Result<PathBuf> {
    db_path_in(&get_data_dir()?)
}

/// Returns the default settings file path. The file itself may not exist.
pub fn get_config_path() -> Result<PathBuf> {
    let base = dirs::config_dir().ok_or_else(|| {
        anyhow::anyhow!("Could not determine system config directory.")
    })?;
    Ok(ensure_dir(base.join(APP_DIR))?.join(CONFIG_FILE))
}

/// Everything tunable from the settings file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub history: HistorySettings,
    pub queue: QueueSettings,
    pub dedup: DedupThresholds,
    pub discovery: DiscoverySettings,
}

impl Settings {
    /// Parse settings from TOML text.
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).context("Invalid settings file")
    }

    /// Load settings from `path`, falling back to defaults.
    ///
    /// Never fails: a missing file is normal, and an unreadable or invalid
    /// one is logged.
    pub fn load(path: &Path) -> Self {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No settings file at {}, using defaults", path.display());
                return Self::default();
            }
            Err(e) => {
                warn!("Could not read settings file {}: {e}", path.display());
                return Self::default();
            }
        };

        match Self::from_toml(&text) {
            Ok(settings) => settings,
            Err(e) => {
                warn!("Ignoring settings file {}: {e:#}", path.display());
                Self::default()
            }
        }
    }

    /// Render as TOML, suitable for writing back to a settings file.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to render settings as TOML")
    }
}

/// Resolved file locations for one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Path to the history database
    pub db_path: PathBuf,
    /// Path to the settings file
    pub config_path: PathBuf,
}

impl RuntimeConfig {
    /// Resolve locations, honouring explicit overrides.
    ///
    /// # Errors
    ///
    /// Fails if a platform directory is needed but cannot be determined or created.
    pub fn resolve(config_path: Option<PathBuf>, data_dir: Option<PathBuf>) -> Result<Self> {
        let config_path = match config_path {
            Some(path) => path,
            None => get_config_path()?,
        };
        let db_path = match data_dir {
            Some(dir) => db_path_in(&dir)?,
            None => get_db_path()?,
        };
        Ok(Self {
            db_path,
            config_path,
        })
    }
}
