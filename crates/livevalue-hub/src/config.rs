//! Broker Configuration - History location, commit workers and rate sampling
//!
//! Configuration is plain data, loadable from RON:
//!
//! ```ron
//! (
//!     history_dir: "./run/timeseries",
//!     commit_workers: 4,
//!     rate_sample_interval_ms: 1000,
//!     rate_min_window_ms: 500,
//!     start_sampler: true,
//! )
//! ```
//!
//! Every field is optional; missing fields take their defaults.

use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration for a [`Broker`](crate::Broker)
///
/// # Example
///
/// ```
/// use livevalue_hub::BrokerConfig;
///
/// let config = BrokerConfig::default();
/// assert_eq!(config.commit_workers(), 1);
///
/// let config = BrokerConfig::default().with_commit_workers(4);
/// assert_eq!(config.commit_workers(), 4.min(livevalue_hub::max_workers()));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// Directory holding one history file per hub
    pub history_dir: PathBuf,

    /// Number of threads publishing touched hubs at commit time
    ///
    /// - `1`: hubs are published serially on the committing thread (default)
    /// - `> 1`: hubs are spread over scoped worker threads
    ///
    /// This value is clamped to `[1, max_workers()]`.
    commit_workers: usize,

    /// Period of the shared rate-meter sampler
    pub rate_sample_interval_ms: u64,

    /// Minimum window for a rate sample to count
    pub rate_min_window_ms: u64,

    /// Spawn the rate sampler thread when the broker is created
    pub start_sampler: bool,
}

impl BrokerConfig {
    /// Parse a configuration from RON text
    pub fn from_ron_str(content: &str) -> Result<Self> {
        Ok(ron::from_str(content)?)
    }

    /// Load a configuration from a RON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_ron_str(&content)
    }

    /// Set the history directory
    pub fn with_history_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.history_dir = dir.into();
        self
    }

    /// Set the number of commit workers
    ///
    /// The value is clamped to `[1, max_workers()]`.
    pub fn with_commit_workers(mut self, n: usize) -> Self {
        self.set_commit_workers(n);
        self
    }

    /// Enable or disable the background rate sampler
    pub fn with_sampler(mut self, start: bool) -> Self {
        self.start_sampler = start;
        self
    }

    /// Number of commit workers, clamped to `[1, max_workers()]`
    pub fn commit_workers(&self) -> usize {
        self.commit_workers.clamp(1, max_workers())
    }

    /// Set the number of commit workers
    pub fn set_commit_workers(&mut self, n: usize) {
        self.commit_workers = n.clamp(1, max_workers());
    }

    pub fn rate_sample_interval(&self) -> Duration {
        Duration::from_millis(self.rate_sample_interval_ms.max(1))
    }

    pub fn rate_min_window(&self) -> Duration {
        Duration::from_millis(self.rate_min_window_ms)
    }
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            history_dir: PathBuf::from("./run/timeseries"),
            commit_workers: 1,
            rate_sample_interval_ms: 1000,
            rate_min_window_ms: 500,
            start_sampler: true,
        }
    }
}

/// Get the maximum number of commit workers on this system
///
/// This uses the `num_cpus` crate to detect the number of logical CPUs.
pub fn max_workers() -> usize {
    num_cpus::get()
}
