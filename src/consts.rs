//! Crate-wide constants: on-disk layout names and scheduler defaults.

/// Directory component that holds all snapshots of a table:
/// `<data-root>/<keyspace>/<table>-<id>/snapshots/<tag>/`.
pub const SNAPSHOT_SUBDIR: &str = "snapshots";

/// Directory component that holds incremental backups. Never treated as
/// snapshot content; the walk prunes it entirely.
pub const BACKUPS_SUBDIR: &str = "backups";

/// Per-snapshot metadata sidecar inside a snapshot directory.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Maximum walk depth relative to a data root. The snapshot layout is exactly
/// four components deep; one extra level keeps the bound cheap without
/// descending into unrelated subtrees.
pub const SNAPSHOT_WALK_DEPTH: usize = 5;

/// Length of a table id on disk: a UUID with separators stripped.
pub const TABLE_ID_HEX_LEN: usize = 32;

/// Default initial delay before the first eviction tick, seconds.
pub const DEFAULT_CLEANUP_INITIAL_DELAY_SECS: u64 = 5;

/// Default fixed period between eviction ticks, seconds.
pub const DEFAULT_CLEANUP_PERIOD_SECS: u64 = 60;

/// Default deletion throughput cap, filesystem entries per second.
pub const DEFAULT_DELETE_ENTRIES_PER_SEC: u32 = 1024;
