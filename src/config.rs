//! Centralized configuration for the snapshot lifecycle subsystem.
//!
//! Goals:
//! - Single place to collect tunables instead of scattering env lookups.
//! - SnapshotConfig::from_env() reads the SNAP_* environment variables.
//! - SnapshotConfigBuilder for programmatic overrides (embedding engines,
//!   tests).
//!
//! Tunables:
//! - data_dirs: every configured data root that may hold snapshot directories.
//! - cleanup_initial_delay / cleanup_period: eviction scheduler timing.
//! - delete_entries_per_sec: throughput cap shared by all snapshot deletions.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::consts::{
    DEFAULT_CLEANUP_INITIAL_DELAY_SECS, DEFAULT_CLEANUP_PERIOD_SECS,
    DEFAULT_DELETE_ENTRIES_PER_SEC,
};

/// Top-level configuration for the snapshot lifecycle manager.
#[derive(Clone, Debug)]
pub struct SnapshotConfig {
    /// All configured data roots. A logical snapshot may own one physical
    /// directory under each of them.
    /// Env: SNAP_DATA_DIRS (colon-separated paths, default empty)
    pub data_dirs: Vec<PathBuf>,

    /// Delay before the first eviction tick after start().
    /// Env: SNAP_CLEANUP_INITIAL_DELAY_SECS (default 5)
    pub cleanup_initial_delay: Duration,

    /// Fixed period between eviction ticks.
    /// Env: SNAP_CLEANUP_PERIOD_SECS (default 60)
    pub cleanup_period: Duration,

    /// Deletion throughput cap in filesystem entries per second, shared by
    /// the eviction scheduler and manual clears. 0 disables throttling.
    /// Env: SNAP_DELETE_ENTRIES_PER_SEC (default 1024)
    pub delete_entries_per_sec: u32,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            data_dirs: Vec::new(),
            cleanup_initial_delay: Duration::from_secs(DEFAULT_CLEANUP_INITIAL_DELAY_SECS),
            cleanup_period: Duration::from_secs(DEFAULT_CLEANUP_PERIOD_SECS),
            delete_entries_per_sec: DEFAULT_DELETE_ENTRIES_PER_SEC,
        }
    }
}

impl SnapshotConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(v) = std::env::var("SNAP_DATA_DIRS") {
            cfg.data_dirs = v
                .split(':')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(PathBuf::from)
                .collect();
        }

        if let Ok(v) = std::env::var("SNAP_CLEANUP_INITIAL_DELAY_SECS") {
            if let Ok(n) = v.trim().parse::<u64>() {
                cfg.cleanup_initial_delay = Duration::from_secs(n);
            }
        }

        if let Ok(v) = std::env::var("SNAP_CLEANUP_PERIOD_SECS") {
            if let Ok(n) = v.trim().parse::<u64>() {
                cfg.cleanup_period = Duration::from_secs(n);
            }
        }

        if let Ok(v) = std::env::var("SNAP_DELETE_ENTRIES_PER_SEC") {
            if let Ok(n) = v.trim().parse::<u32>() {
                cfg.delete_entries_per_sec = n;
            }
        }

        cfg
    }
}

impl fmt::Display for SnapshotConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SnapshotConfig {{ \
             data_dirs: {}, \
             cleanup_initial_delay: {}s, \
             cleanup_period: {}s, \
             delete_entries_per_sec: {} \
             }}",
            self.data_dirs.len(),
            self.cleanup_initial_delay.as_secs(),
            self.cleanup_period.as_secs(),
            self.delete_entries_per_sec,
        )
    }
}

/// Lightweight builder that produces a SnapshotConfig.
#[derive(Clone, Debug)]
pub struct SnapshotConfigBuilder {
    cfg: SnapshotConfig,
}

impl Default for SnapshotConfigBuilder {
    fn default() -> Self {
        // Start from env, then allow overrides.
        Self {
            cfg: SnapshotConfig::from_env(),
        }
    }
}

impl SnapshotConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a clean default (without reading env).
    pub fn from_default() -> Self {
        Self {
            cfg: SnapshotConfig::default(),
        }
    }

    pub fn data_dirs<I, P>(mut self, dirs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.cfg.data_dirs = dirs.into_iter().map(Into::into).collect();
        self
    }

    pub fn cleanup_initial_delay(mut self, d: Duration) -> Self {
        self.cfg.cleanup_initial_delay = d;
        self
    }

    pub fn cleanup_period(mut self, d: Duration) -> Self {
        self.cfg.cleanup_period = d;
        self
    }

    pub fn delete_entries_per_sec(mut self, n: u32) -> Self {
        self.cfg.delete_entries_per_sec = n;
        self
    }

    /// Finish the builder and obtain the configuration.
    pub fn build(self) -> SnapshotConfig {
        self.cfg
    }
}
