//! Discovery of on-disk snapshots across all configured data roots.
//!
//! Two-phase pipeline:
//! 1. Walk: each root is walked independently (bounded depth), emitting raw
//!    (identity, path) pairs. No shared mutable state during the walk.
//! 2. Reconcile: a single-threaded pass groups the pairs by snapshot id and
//!    finalizes one TableSnapshot per logical snapshot, so a snapshot striped
//!    across several roots comes back as one entity with several directories.
//!
//! Matching is an explicit per-segment parser over the candidate's path
//! relative to its root (shape `<keyspace>/<table>-<32hex>/snapshots/<tag>`),
//! not a combined regex.
//!
//! Failure policy:
//! - malformed directory (bad id, corrupt manifest): warn + skip, walk continues;
//! - I/O failure on a root: that root's walk aborts and is reported in
//!   LoadReport::failures; other roots still complete.

use anyhow::{Context, Result};
use log::{debug, warn};
use std::collections::HashMap;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

use crate::consts::{BACKUPS_SUBDIR, SNAPSHOT_SUBDIR, SNAPSHOT_WALK_DEPTH, TABLE_ID_HEX_LEN};
use super::entity::{parse_table_id, SnapshotIdentity, TableSnapshot, TableSnapshotBuilder};
use super::manifest::read_manifest;

/// One matched directory before reconciliation.
#[derive(Debug)]
struct RawSnapshotDir {
    identity: SnapshotIdentity,
    path: PathBuf,
}

/// A data root whose walk failed with an I/O error. The root's contribution
/// is lost for this load; everything else is unaffected.
#[derive(Debug)]
pub struct RootFailure {
    pub root: PathBuf,
    pub error: anyhow::Error,
}

/// Outcome of a full load: the reconciled snapshot set plus one entry per
/// failed root, so callers can report each failure distinctly instead of
/// aborting startup.
#[derive(Debug)]
pub struct LoadReport {
    pub snapshots: Vec<TableSnapshot>,
    pub failures: Vec<RootFailure>,
}

/// Walks data roots and reconciles what it finds into TableSnapshot entities.
pub struct SnapshotLoader {
    data_dirs: Vec<PathBuf>,
}

impl SnapshotLoader {
    pub fn new<I, P>(data_dirs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            data_dirs: data_dirs.into_iter().map(Into::into).collect(),
        }
    }

    /// Synchronous, blocking walk of every configured root. Never panics and
    /// never aborts on a single bad directory.
    pub fn load_snapshots(&self) -> LoadReport {
        let mut raw: Vec<RawSnapshotDir> = Vec::new();
        let mut failures: Vec<RootFailure> = Vec::new();

        for root in &self.data_dirs {
            if let Err(error) = walk_root(root, &mut raw) {
                failures.push(RootFailure {
                    root: root.clone(),
                    error,
                });
            }
        }

        LoadReport {
            snapshots: reconcile(raw),
            failures,
        }
    }
}

fn walk_root(root: &Path, out: &mut Vec<RawSnapshotDir>) -> Result<()> {
    walk_dir(root, root, 0, out).with_context(|| format!("walk data root {}", root.display()))
}

/// Recursive descent, bounded to SNAPSHOT_WALK_DEPTH below the root; a tag
/// directory is only matchable one level above the bound, since entries at
/// the bound itself are no longer walked as directories.
/// Children of a directory literally named `snapshots` are match candidates
/// and leaves; a directory literally named `backups` is pruned entirely.
fn walk_dir(root: &Path, dir: &Path, depth: usize, out: &mut Vec<RawSnapshotDir>) -> Result<()> {
    let in_snapshots = dir.file_name() == Some(OsStr::new(SNAPSHOT_SUBDIR));

    for entry in fs::read_dir(dir).with_context(|| format!("read dir {}", dir.display()))? {
        let entry = entry.with_context(|| format!("read dir entry in {}", dir.display()))?;
        let file_type = entry
            .file_type()
            .with_context(|| format!("stat {}", entry.path().display()))?;
        if !file_type.is_dir() {
            continue;
        }
        let path = entry.path();

        if in_snapshots {
            // Candidate snapshot directory. Attempt the match, then stop:
            // whatever lives below is snapshot-internal content.
            debug!("processing directory {}", path.display());
            match match_snapshot_dir(root, &path) {
                Ok(Some(identity)) => out.push(RawSnapshotDir { identity, path }),
                Ok(None) => {}
                Err(e) => warn!("could not load snapshot from {}: {:#}", path.display(), e),
            }
            continue;
        }

        if entry.file_name() == OsStr::new(BACKUPS_SUBDIR) {
            continue;
        }

        // A directory sitting at the depth bound is visited as a plain
        // entry: its children can no longer form a matchable tag, so stop
        // descending one level short of the bound.
        if depth + 2 < SNAPSHOT_WALK_DEPTH {
            walk_dir(root, &path, depth + 1, out)?;
        }
    }
    Ok(())
}

/// Match a candidate directory against the structural shape
/// `<keyspace>/<table>-<32hex>/snapshots/<tag>` taken from the last four
/// components of its path relative to the data root.
///
/// Ok(None): shape does not match (not a snapshot directory).
/// Err: the shape matched but identity extraction failed (malformed id).
fn match_snapshot_dir(root: &Path, dir: &Path) -> Result<Option<SnapshotIdentity>> {
    let rel = match dir.strip_prefix(root) {
        Ok(r) => r,
        Err(_) => return Ok(None),
    };
    let segments: Vec<&str> = rel
        .iter()
        .map(|c| c.to_str())
        .collect::<Option<Vec<_>>>()
        .unwrap_or_default();
    if segments.len() < 4 {
        return Ok(None);
    }
    let tail = &segments[segments.len() - 4..];
    let (keyspace, table_dir, snapshots, tag) = (tail[0], tail[1], tail[2], tail[3]);

    if snapshots != SNAPSHOT_SUBDIR {
        return Ok(None);
    }
    if !is_word(keyspace) || !is_tag(tag) {
        return Ok(None);
    }

    // `<table>-<32hex>`: the id is exactly the trailing 32 characters after
    // a separating hyphen; the table name itself never contains one.
    if table_dir.len() < TABLE_ID_HEX_LEN + 2 {
        return Ok(None);
    }
    let split = table_dir.len() - TABLE_ID_HEX_LEN;
    if table_dir.as_bytes()[split - 1] != b'-' {
        return Ok(None);
    }
    let table = &table_dir[..split - 1];
    let id_hex = &table_dir[split..];
    if !is_word(table) || !id_hex.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
    {
        return Ok(None);
    }

    let table_id = parse_table_id(id_hex)?;
    Ok(Some(SnapshotIdentity {
        keyspace: keyspace.to_string(),
        table: table.to_string(),
        table_id,
        tag: tag.to_string(),
    }))
}

fn is_word(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn is_tag(s: &str) -> bool {
    !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Second phase: group raw pairs by snapshot id and finalize. Also reads the
/// per-directory manifest so rediscovered snapshots keep their expiration
/// instant (first manifest found wins; a corrupt one is logged and ignored).
fn reconcile(raw: Vec<RawSnapshotDir>) -> Vec<TableSnapshot> {
    let mut builders: HashMap<String, TableSnapshotBuilder> = HashMap::new();

    for RawSnapshotDir { identity, path } in raw {
        let snapshot_id = identity.snapshot_id();
        let builder = builders.entry(snapshot_id).or_insert_with(|| {
            TableSnapshotBuilder::new(
                &identity.keyspace,
                &identity.table,
                identity.table_id,
                &identity.tag,
            )
        });
        match read_manifest(&path) {
            Ok(Some(m)) => {
                builder.apply_manifest(&m);
            }
            Ok(None) => {}
            Err(e) => warn!("ignoring manifest in {}: {:#}", path.display(), e),
        }
        builder.add_directory(path);
    }

    let mut snapshots = Vec::with_capacity(builders.len());
    for (snapshot_id, builder) in builders {
        match builder.build() {
            Ok(snap) => snapshots.push(snap),
            Err(e) => warn!("could not reconcile snapshot {}: {:#}", snapshot_id, e),
        }
    }
    snapshots
}
