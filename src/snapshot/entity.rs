//! Snapshot identity and the reconciled TableSnapshot entity.
//!
//! A logical snapshot is named by (keyspace, table, table-id, tag). The same
//! logical snapshot may own one physical directory per configured data root;
//! reconciliation groups those directories under a single entity keyed by
//! `snapshot_id`, a stable colon-joined encoding of the identity fields.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

use crate::consts::TABLE_ID_HEX_LEN;
use super::manifest::SnapshotManifest;

/// The (keyspace, table, table-id, tag) tuple that uniquely names a logical
/// snapshot across all data roots.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SnapshotIdentity {
    pub keyspace: String,
    pub table: String,
    pub table_id: Uuid,
    pub tag: String,
}

impl SnapshotIdentity {
    /// Stable, human-readable key: `<keyspace>:<table>:<table-id>:<tag>`.
    /// Used both for reconciliation grouping and external display.
    pub fn snapshot_id(&self) -> String {
        format!(
            "{}:{}:{}:{}",
            self.keyspace, self.table, self.table_id, self.tag
        )
    }
}

/// Reconstitute a table id from its on-disk form: 32 lowercase hex characters
/// with separators stripped. The canonical 8-4-4-4-12 form is rebuilt by
/// splitting at character positions 8/12/16/20, never by reparsing the string
/// as a generic number.
pub fn parse_table_id(hex: &str) -> Result<Uuid> {
    if hex.len() != TABLE_ID_HEX_LEN {
        bail!(
            "table id must be {} hex characters, got {} ({:?})",
            TABLE_ID_HEX_LEN,
            hex.len(),
            hex
        );
    }
    if !hex
        .chars()
        .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
    {
        bail!("table id contains non-hex characters: {:?}", hex);
    }
    let dashed = format!(
        "{}-{}-{}-{}-{}",
        &hex[..8],
        &hex[8..12],
        &hex[12..16],
        &hex[16..20],
        &hex[20..]
    );
    Uuid::parse_str(&dashed).with_context(|| format!("parse table id {}", dashed))
}

/// A reconciled snapshot: identity plus every physical directory backing it,
/// plus an optional expiration instant. The directory set is non-empty once
/// built; an identity with zero valid directories is never materialized.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableSnapshot {
    identity: SnapshotIdentity,
    snapshot_id: String,
    directories: Vec<PathBuf>,
    created_at: Option<DateTime<Utc>>,
    expires_at: Option<DateTime<Utc>>,
}

impl TableSnapshot {
    pub fn identity(&self) -> &SnapshotIdentity {
        &self.identity
    }

    pub fn keyspace(&self) -> &str {
        &self.identity.keyspace
    }

    pub fn table(&self) -> &str {
        &self.identity.table
    }

    pub fn table_id(&self) -> Uuid {
        self.identity.table_id
    }

    pub fn tag(&self) -> &str {
        &self.identity.tag
    }

    pub fn snapshot_id(&self) -> &str {
        &self.snapshot_id
    }

    pub fn directories(&self) -> &[PathBuf] {
        &self.directories
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// True when the snapshot carries a finite lifetime.
    pub fn is_expiring(&self) -> bool {
        self.expires_at.is_some()
    }

    /// True when the expiration instant is present and has passed.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(t) => t <= now,
            None => false,
        }
    }
}

impl fmt::Display for TableSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.snapshot_id)
    }
}

/// In-progress snapshot assembled during reconciliation or by the
/// snapshot-creation path.
#[derive(Debug)]
pub struct TableSnapshotBuilder {
    identity: SnapshotIdentity,
    directories: Vec<PathBuf>,
    created_at: Option<DateTime<Utc>>,
    expires_at: Option<DateTime<Utc>>,
    manifest_seen: bool,
}

impl TableSnapshotBuilder {
    pub fn new(keyspace: &str, table: &str, table_id: Uuid, tag: &str) -> Self {
        Self {
            identity: SnapshotIdentity {
                keyspace: keyspace.to_string(),
                table: table.to_string(),
                table_id,
                tag: tag.to_string(),
            },
            directories: Vec::new(),
            created_at: None,
            expires_at: None,
            manifest_seen: false,
        }
    }

    pub fn add_directory(&mut self, dir: PathBuf) -> &mut Self {
        self.directories.push(dir);
        self
    }

    pub fn created_at(&mut self, t: DateTime<Utc>) -> &mut Self {
        self.created_at = Some(t);
        self
    }

    /// Set a finite lifetime. The expiration instant is fixed at creation and
    /// never renewed by rediscovery.
    pub fn expires_at(&mut self, t: DateTime<Utc>) -> &mut Self {
        self.expires_at = Some(t);
        self
    }

    /// Absorb a manifest read from one of the snapshot's directories. The
    /// first manifest seen wins; later copies are ignored.
    pub fn apply_manifest(&mut self, m: &SnapshotManifest) -> &mut Self {
        if !self.manifest_seen {
            self.manifest_seen = true;
            self.created_at = Some(m.created_at);
            self.expires_at = m.expires_at;
        }
        self
    }

    pub fn build(self) -> Result<TableSnapshot> {
        let snapshot_id = self.identity.snapshot_id();
        if self.directories.is_empty() {
            bail!("snapshot {} has no directories", snapshot_id);
        }
        Ok(TableSnapshot {
            identity: self.identity,
            snapshot_id,
            directories: self.directories,
            created_at: self.created_at,
            expires_at: self.expires_at,
        })
    }
}
