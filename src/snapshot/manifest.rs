//! Per-snapshot manifest sidecar (best-effort).
//!
//! Format: <snapshot-dir>/manifest.json
//! {
//!   "created_at": "2026-08-25T10:00:00Z",
//!   "expires_at": "2026-09-25T10:00:00Z"   // absent => never expires
//! }
//!
//! Notes:
//! - The manifest is how an expiration instant survives a restart: the loader
//!   reads it back when reconciling on-disk snapshots.
//! - A missing or corrupt manifest degrades to "non-expiring"; it never fails
//!   a load. Writes are atomic via tmp+rename.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::consts::MANIFEST_FILE;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SnapshotManifest {
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

fn manifest_path(snapshot_dir: &Path) -> PathBuf {
    snapshot_dir.join(MANIFEST_FILE)
}

/// Read the manifest from a snapshot directory. Ok(None) when the file does
/// not exist; Err only for unreadable or unparsable content.
pub fn read_manifest(snapshot_dir: &Path) -> Result<Option<SnapshotManifest>> {
    let p = manifest_path(snapshot_dir);
    if !p.exists() {
        return Ok(None);
    }
    let bytes = fs::read(&p).with_context(|| format!("read {}", p.display()))?;
    let m: SnapshotManifest =
        serde_json::from_slice(&bytes).with_context(|| format!("parse {}", p.display()))?;
    Ok(Some(m))
}

/// Write the manifest atomically into a snapshot directory.
pub fn write_manifest(snapshot_dir: &Path, m: &SnapshotManifest) -> Result<()> {
    fs::create_dir_all(snapshot_dir)
        .with_context(|| format!("create {}", snapshot_dir.display()))?;
    let path = manifest_path(snapshot_dir);
    let tmp = snapshot_dir.join(format!("{}.tmp", MANIFEST_FILE));

    let mut f = OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .open(&tmp)
        .with_context(|| format!("open {}", tmp.display()))?;
    let bytes = serde_json::to_vec_pretty(m).context("serialize manifest")?;
    f.write_all(&bytes)
        .with_context(|| format!("write {}", tmp.display()))?;
    f.sync_all().ok();
    drop(f);

    fs::rename(&tmp, &path)
        .with_context(|| format!("rename {} -> {}", tmp.display(), path.display()))?;
    Ok(())
}
