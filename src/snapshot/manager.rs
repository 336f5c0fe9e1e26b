//! Lifecycle manager: composes the loader, the expiration index and the
//! eviction task behind one exclusive lock.
//!
//! Locking model: a single mutex guards the index and the task handle, held
//! for the full duration of every public operation including the whole
//! eviction tick. A tick deleting several snapshots blocks foreground
//! add_snapshot calls until it completes (and vice versa), so the index is
//! never observed mid-update and stop() cannot race an eviction pass.
//!
//! stop() vs shutdown(): stop() cancels future ticks and clears the index
//! without waiting for an in-flight tick to return; shutdown() additionally
//! waits, with a timeout, for the worker thread to drain.

use anyhow::{anyhow, Result};
use chrono::Utc;
use log::{debug, error, info};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use crate::config::SnapshotConfig;
use crate::ratelimit::RateLimiter;
use super::entity::TableSnapshot;
use super::index::ExpirationIndex;
use super::io::remove_snapshot_directory;
use super::loader::SnapshotLoader;
use super::scheduler::PeriodicTask;

/// Bootstrap source: enumerates every currently known snapshot. The default
/// wraps SnapshotLoader over the configured data roots.
pub type SnapshotSource = Box<dyn Fn() -> Vec<TableSnapshot> + Send + Sync>;

struct ManagerInner {
    index: ExpirationIndex,
    task: Option<PeriodicTask>,
}

pub struct LifecycleManager {
    config: SnapshotConfig,
    limiter: Arc<RateLimiter>,
    source: SnapshotSource,
    inner: Arc<Mutex<ManagerInner>>,
}

impl LifecycleManager {
    /// Manager over the configured data roots. Per-root load failures are
    /// logged distinctly and never abort startup.
    pub fn new(config: SnapshotConfig) -> Self {
        let loader = SnapshotLoader::new(config.data_dirs.clone());
        let source: SnapshotSource = Box::new(move || {
            let report = loader.load_snapshots();
            for failure in &report.failures {
                error!(
                    "failed to load snapshots from {}: {:#}",
                    failure.root.display(),
                    failure.error
                );
            }
            report.snapshots
        });
        Self::with_source(config, source)
    }

    /// Manager with an explicit bootstrap source (embedding engines, tests).
    pub fn with_source(config: SnapshotConfig, source: SnapshotSource) -> Self {
        let limiter = Arc::new(RateLimiter::new(config.delete_entries_per_sec));
        Self {
            config,
            limiter,
            source,
            inner: Arc::new(Mutex::new(ManagerInner {
                index: ExpirationIndex::new(),
                task: None,
            })),
        }
    }

    /// Bootstrap-load all current snapshots, admit the expiring subset into
    /// the index and begin periodic eviction. Idempotent while running.
    pub fn start(&self) -> Result<()> {
        // The walk is blocking and runs on the caller's thread, outside the
        // lock, so it cannot stall a concurrent tick.
        let snapshots = (self.source)();

        let mut g = self.inner.lock().unwrap();
        debug!("loading {} snapshots", snapshots.len());
        for snapshot in snapshots {
            add_locked(&mut g.index, snapshot);
        }

        if g.task.is_none() {
            info!(
                "scheduling expired snapshot cleanup: initial_delay={}s period={}s",
                self.config.cleanup_initial_delay.as_secs(),
                self.config.cleanup_period.as_secs()
            );
            let weak: Weak<Mutex<ManagerInner>> = Arc::downgrade(&self.inner);
            let limiter = Arc::clone(&self.limiter);
            let task = PeriodicTask::spawn(
                "snapshot-cleanup",
                self.config.cleanup_initial_delay,
                self.config.cleanup_period,
                move || {
                    if let Some(inner) = weak.upgrade() {
                        let mut g = inner.lock().unwrap();
                        clear_expired_locked(&mut g.index, &limiter);
                    }
                },
            )?;
            g.task = Some(task);
        }
        Ok(())
    }

    /// Clear the index and cancel the eviction task. Blocks on the lock until
    /// an in-flight tick has completed its batch, then cancels without
    /// waiting for the worker thread itself to exit.
    pub fn stop(&self) {
        let mut g = self.inner.lock().unwrap();
        g.index.clear();
        if let Some(task) = g.task.take() {
            task.cancel();
        }
    }

    /// Process-shutdown variant: stop, then wait (with a timeout) for the
    /// background worker to drain. A timeout is reported as an error distinct
    /// from plain cancellation.
    pub fn shutdown(&self, timeout: Duration) -> Result<()> {
        let task = {
            let mut g = self.inner.lock().unwrap();
            g.index.clear();
            g.task.take()
        };
        match task {
            Some(task) => task.wait(timeout),
            None => Ok(()),
        }
    }

    /// Register a snapshot with the index if it carries a finite lifetime;
    /// no-op otherwise. Callable at any time, including before start().
    pub fn add_snapshot(&self, snapshot: TableSnapshot) {
        let mut g = self.inner.lock().unwrap();
        add_locked(&mut g.index, snapshot);
    }

    /// Read-only view of the currently tracked expiring set, in expiration
    /// order.
    pub fn get_expiring_snapshots(&self) -> Vec<TableSnapshot> {
        let g = self.inner.lock().unwrap();
        g.index.iter().cloned().collect()
    }

    /// Delete one snapshot now: remove its backing directories and drop it
    /// from the index. Deletion failures are returned to the caller; the
    /// snapshot leaves the index regardless.
    pub fn clear_snapshot(&self, snapshot: &TableSnapshot) -> Result<()> {
        let mut g = self.inner.lock().unwrap();
        clear_one_locked(&mut g.index, &self.limiter, snapshot)
    }

    /// Run one eviction pass immediately (the same code the periodic task
    /// runs). Exposed for deterministic testing and operator tooling.
    pub fn clear_expired_snapshots(&self) {
        let mut g = self.inner.lock().unwrap();
        clear_expired_locked(&mut g.index, &self.limiter);
    }

    /// Whether the eviction task is currently scheduled.
    pub fn is_running(&self) -> bool {
        self.inner.lock().unwrap().task.is_some()
    }
}

impl Drop for LifecycleManager {
    fn drop(&mut self) {
        if let Ok(mut g) = self.inner.lock() {
            if let Some(task) = g.task.take() {
                task.cancel();
            }
        }
    }
}

fn add_locked(index: &mut ExpirationIndex, snapshot: TableSnapshot) {
    // Only expiring snapshots are tracked.
    if snapshot.is_expiring() {
        debug!("adding expiring snapshot {}", snapshot);
        index.insert(snapshot);
    }
}

/// One eviction tick: read the clock once, then pop-and-delete every entry
/// already due. A tick with nothing expired is a single peek.
fn clear_expired_locked(index: &mut ExpirationIndex, limiter: &RateLimiter) {
    let now = Utc::now();
    while let Some(earliest) = index.peek_earliest() {
        if !earliest.is_expired(now) {
            break;
        }
        let expired = earliest.clone();
        debug!("removing expired snapshot {}", expired);
        if let Err(e) = clear_one_locked(index, limiter, &expired) {
            error!("failed to remove expired snapshot {}: {:#}", expired, e);
        }
    }
}

/// Delete a snapshot's directories and remove it from the index. The index
/// removal happens regardless of deletion outcome; a failed deletion is not
/// retried automatically and must be remediated manually.
fn clear_one_locked(
    index: &mut ExpirationIndex,
    limiter: &RateLimiter,
    snapshot: &TableSnapshot,
) -> Result<()> {
    let mut failed: Vec<String> = Vec::new();
    for dir in snapshot.directories() {
        if let Err(e) = remove_snapshot_directory(limiter, dir) {
            failed.push(format!("{}: {:#}", dir.display(), e));
        }
    }
    index.remove(snapshot);
    if failed.is_empty() {
        Ok(())
    } else {
        Err(anyhow!(
            "failed to remove {} of {} directories of snapshot {}: {}",
            failed.len(),
            snapshot.directories().len(),
            snapshot,
            failed.join("; ")
        ))
    }
}
