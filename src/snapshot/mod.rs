//! Snapshot lifecycle module split into submodules:
//! - entity.rs: SnapshotIdentity + TableSnapshot (reconciled entity, builder, table-id parsing).
//! - manifest.rs: per-snapshot manifest.json (created_at / expires_at) — best-effort.
//! - loader.rs: SnapshotLoader (bounded walk of data roots + reconciliation).
//! - index.rs: ExpirationIndex (snapshots with a TTL, ordered by expiration instant).
//! - scheduler.rs: PeriodicTask (cancellable fixed-period background task).
//! - manager.rs: LifecycleManager (start/stop, add/clear, eviction tick).
//! - io.rs: rate-limited recursive removal of snapshot directories.
//!
//! External API surface:
//! - LifecycleManager
//! - SnapshotLoader / LoadReport
//! - TableSnapshot / TableSnapshotBuilder / SnapshotIdentity
//! - SnapshotManifest

mod entity;
mod index;
mod io;
mod loader;
mod manifest;
mod scheduler;
mod manager;

pub use entity::{parse_table_id, SnapshotIdentity, TableSnapshot, TableSnapshotBuilder};
pub use index::ExpirationIndex;
pub use io::remove_snapshot_directory;
pub use loader::{LoadReport, RootFailure, SnapshotLoader};
pub use manager::{LifecycleManager, SnapshotSource};
pub use manifest::{read_manifest, write_manifest, SnapshotManifest};
