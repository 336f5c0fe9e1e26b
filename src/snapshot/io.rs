//! Rate-limited removal of snapshot directories.
//!
//! Snapshot trees can be large; deletions run behind a shared throughput
//! limiter so an eviction pass cannot saturate the disks that foreground
//! traffic is using. One permit is taken per filesystem entry removed.

use anyhow::{Context, Result};
use log::debug;
use std::fs;
use std::path::Path;

use crate::ratelimit::RateLimiter;

/// Recursively remove one physical snapshot directory. A directory that no
/// longer exists is not an error (it may have been cleared manually).
pub fn remove_snapshot_directory(limiter: &RateLimiter, dir: &Path) -> Result<()> {
    if !dir.exists() {
        debug!("snapshot directory {} already gone", dir.display());
        return Ok(());
    }
    debug!("removing snapshot directory {}", dir.display());
    remove_tree(limiter, dir)
}

fn remove_tree(limiter: &RateLimiter, dir: &Path) -> Result<()> {
    for entry in fs::read_dir(dir).with_context(|| format!("read dir {}", dir.display()))? {
        let entry = entry.with_context(|| format!("read dir entry in {}", dir.display()))?;
        let path = entry.path();
        let file_type = entry
            .file_type()
            .with_context(|| format!("stat {}", path.display()))?;
        if file_type.is_dir() {
            remove_tree(limiter, &path)?;
        } else {
            limiter.acquire();
            fs::remove_file(&path).with_context(|| format!("remove file {}", path.display()))?;
        }
    }
    limiter.acquire();
    fs::remove_dir(dir).with_context(|| format!("remove dir {}", dir.display()))?;
    Ok(())
}
