use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use snapkeeper::config::SnapshotConfigBuilder;
use snapkeeper::snapshot::{
    parse_table_id, LifecycleManager, SnapshotManifest, TableSnapshot, TableSnapshotBuilder,
    write_manifest,
};

const TABLE_ID_HEX: &str = "c7e513243f0711ec9bbc0242ac130002";

#[test]
fn eviction_tick_deletes_only_due_snapshots() -> Result<()> {
    let root = unique_root("tick");
    let now = Utc::now();
    let overdue = disk_snapshot(&root, "overdue", Some(now - Duration::seconds(5)))?;
    let just_due = disk_snapshot(&root, "just-due", Some(now - Duration::seconds(1)))?;
    let future = disk_snapshot(&root, "future", Some(now + Duration::seconds(100)))?;

    let manager = test_manager();
    manager.add_snapshot(overdue.clone());
    manager.add_snapshot(just_due.clone());
    manager.add_snapshot(future.clone());

    manager.clear_expired_snapshots();

    assert!(!overdue.directories()[0].exists());
    assert!(!just_due.directories()[0].exists());
    assert!(future.directories()[0].exists());

    let remaining = manager.get_expiring_snapshots();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].tag(), "future");

    cleanup(&root);
    Ok(())
}

#[test]
fn non_expiring_snapshot_is_never_tracked_or_deleted() -> Result<()> {
    let root = unique_root("eternal");
    let eternal = disk_snapshot(&root, "keep-forever", None)?;

    let manager = test_manager();
    manager.add_snapshot(eternal.clone());

    assert!(manager.get_expiring_snapshots().is_empty());
    manager.clear_expired_snapshots();
    assert!(eternal.directories()[0].exists());

    cleanup(&root);
    Ok(())
}

#[test]
fn start_bootstraps_from_disk_and_evicts_in_background() -> Result<()> {
    let root = unique_root("bootstrap");
    let dir = make_snapshot_dir(&root, "expired-on-disk")?;
    write_manifest(
        &dir,
        &SnapshotManifest {
            created_at: Utc::now() - Duration::hours(2),
            expires_at: Some(Utc::now() - Duration::hours(1)),
        },
    )?;

    let config = SnapshotConfigBuilder::from_default()
        .data_dirs([root.clone()])
        .cleanup_initial_delay(StdDuration::from_millis(0))
        .cleanup_period(StdDuration::from_millis(10))
        .delete_entries_per_sec(0)
        .build();
    let manager = LifecycleManager::new(config);
    manager.start()?;

    // The background task owns the deletion now; poll for it.
    let mut deleted = false;
    for _ in 0..200 {
        if !dir.exists() {
            deleted = true;
            break;
        }
        std::thread::sleep(StdDuration::from_millis(20));
    }
    assert!(deleted, "expired on-disk snapshot must be evicted");
    assert!(manager.get_expiring_snapshots().is_empty());

    manager.shutdown(StdDuration::from_secs(5))?;
    cleanup(&root);
    Ok(())
}

#[test]
fn start_is_idempotent_and_stop_allows_restart() -> Result<()> {
    let manager = test_manager();

    manager.start()?;
    assert!(manager.is_running());
    manager.start()?;
    assert!(manager.is_running());

    manager.stop();
    assert!(!manager.is_running());

    manager.start()?;
    assert!(manager.is_running());

    manager.shutdown(StdDuration::from_secs(5))?;
    assert!(!manager.is_running());
    Ok(())
}

#[test]
fn stop_clears_the_tracked_set() -> Result<()> {
    let manager = test_manager();
    manager.start()?;
    manager.add_snapshot(mem_snapshot("pending", Some(Utc::now() + Duration::hours(1))));
    assert_eq!(manager.get_expiring_snapshots().len(), 1);

    manager.stop();
    assert!(manager.get_expiring_snapshots().is_empty());
    Ok(())
}

#[test]
fn add_snapshot_works_before_start() -> Result<()> {
    let manager = test_manager();
    manager.add_snapshot(mem_snapshot("early", Some(Utc::now() + Duration::hours(1))));
    assert_eq!(manager.get_expiring_snapshots().len(), 1);
    Ok(())
}

#[test]
fn manual_clear_removes_directories_and_index_entry() -> Result<()> {
    let root = unique_root("manual");
    let snap = disk_snapshot(&root, "manual-clear", Some(Utc::now() + Duration::hours(1)))?;

    let manager = test_manager();
    manager.add_snapshot(snap.clone());
    manager.clear_snapshot(&snap)?;

    assert!(!snap.directories()[0].exists());
    assert!(manager.get_expiring_snapshots().is_empty());

    cleanup(&root);
    Ok(())
}

#[test]
fn failed_deletion_still_removes_index_entry() -> Result<()> {
    let root = unique_root("del-fail");
    fs::create_dir_all(&root)?;
    // The "directory" is actually a file: recursive removal must fail.
    let bogus = root.join("not-a-directory");
    fs::write(&bogus, b"oops")?;

    let id = parse_table_id(TABLE_ID_HEX)?;
    let mut b = TableSnapshotBuilder::new("ks1", "users", id, "broken");
    b.add_directory(bogus.clone());
    b.expires_at(Utc::now() + Duration::hours(1));
    let snap = b.build()?;

    let manager = test_manager();
    manager.add_snapshot(snap.clone());
    assert!(manager.clear_snapshot(&snap).is_err());
    // Not retried automatically: the entry is gone despite the failure.
    assert!(manager.get_expiring_snapshots().is_empty());

    cleanup(&root);
    Ok(())
}

#[test]
fn concurrent_adds_during_eviction_are_serialized_and_kept() -> Result<()> {
    let root = unique_root("concurrent");
    let now = Utc::now();
    let manager = Arc::new(test_manager());
    for i in 0..10 {
        let snap = disk_snapshot(&root, &format!("due-{}", i), Some(now - Duration::seconds(1)))?;
        manager.add_snapshot(snap);
    }

    let mut writers = Vec::new();
    for w in 0..4 {
        let m = Arc::clone(&manager);
        writers.push(std::thread::spawn(move || {
            for i in 0..25 {
                m.add_snapshot(mem_snapshot(
                    &format!("live-{}-{}", w, i),
                    Some(Utc::now() + Duration::hours(1)),
                ));
            }
        }));
    }
    let evictor = {
        let m = Arc::clone(&manager);
        std::thread::spawn(move || {
            for _ in 0..20 {
                m.clear_expired_snapshots();
            }
        })
    };
    for t in writers {
        t.join().unwrap();
    }
    evictor.join().unwrap();
    manager.clear_expired_snapshots();

    // All hundred concurrent additions survive; all due snapshots are gone.
    let remaining = manager.get_expiring_snapshots();
    assert_eq!(remaining.len(), 100);
    assert!(remaining.iter().all(|s| s.tag().starts_with("live-")));

    cleanup(&root);
    Ok(())
}

// ---------------- helpers ----------------

fn cleanup(root: &Path) {
    let _ = fs::remove_dir_all(root);
}

fn unique_root(prefix: &str) -> PathBuf {
    let _ = env_logger::builder().is_test(true).try_init();
    let pid = std::process::id();
    let t = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!("snapkeeper-mgr-{}-{}-{}", prefix, pid, t))
}

/// Manager with no data roots, a fast scheduler and no delete throttling.
fn test_manager() -> LifecycleManager {
    let _ = env_logger::builder().is_test(true).try_init();
    let config = SnapshotConfigBuilder::from_default()
        .cleanup_initial_delay(StdDuration::from_millis(0))
        .cleanup_period(StdDuration::from_millis(10))
        .delete_entries_per_sec(0)
        .build();
    LifecycleManager::new(config)
}

fn make_snapshot_dir(root: &Path, tag: &str) -> Result<PathBuf> {
    let dir = root
        .join("ks1")
        .join(format!("users-{}", TABLE_ID_HEX))
        .join("snapshots")
        .join(tag);
    fs::create_dir_all(&dir)?;
    fs::write(dir.join("data.db"), b"sstable bytes")?;
    Ok(dir)
}

/// Snapshot entity backed by a real on-disk directory.
fn disk_snapshot(root: &Path, tag: &str, expires_at: Option<DateTime<Utc>>) -> Result<TableSnapshot> {
    let dir = make_snapshot_dir(root, tag)?;
    let id = parse_table_id(TABLE_ID_HEX)?;
    let mut b = TableSnapshotBuilder::new("ks1", "users", id, tag);
    b.add_directory(dir);
    if let Some(t) = expires_at {
        b.expires_at(t);
    }
    Ok(b.build()?)
}

/// Snapshot entity with a directory path that is never touched on disk.
fn mem_snapshot(tag: &str, expires_at: Option<DateTime<Utc>>) -> TableSnapshot {
    let id = parse_table_id(TABLE_ID_HEX).unwrap();
    let mut b = TableSnapshotBuilder::new("ks1", "users", id, tag);
    b.add_directory(PathBuf::from(format!("/nonexistent/ks1/users/snapshots/{}", tag)));
    if let Some(t) = expires_at {
        b.expires_at(t);
    }
    b.build().unwrap()
}
