// Base modules
pub mod consts;
pub mod config;
pub mod ratelimit;

// Snapshot lifecycle (folder with mod.rs)
pub mod snapshot; // src/snapshot/{mod,entity,manifest,loader,index,scheduler,manager,io}.rs

// Convenient re-exports
pub use config::{SnapshotConfig, SnapshotConfigBuilder};
pub use ratelimit::RateLimiter;
pub use snapshot::{
    LifecycleManager, LoadReport, SnapshotLoader, SnapshotManifest, TableSnapshot,
    TableSnapshotBuilder,
};
