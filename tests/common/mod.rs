// tests/common/mod.rs
#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use cams_node::core::FixedClock;
use cams_node::store::{SegmentStore, StoreConfig};
use tempfile::TempDir;

pub struct Fixture {
    pub dir: TempDir,
    pub root: PathBuf,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path().join("front");
        fs::create_dir_all(&root).expect("camera root");
        Self { dir, root }
    }

    /// Writes `size` bytes at `rel` (`YYYY-MM-DD/HH/MM/SS.mp4`).
    pub fn segment(&self, rel: &str, size: usize) -> PathBuf {
        write_file(&self.root, rel, size)
    }

    pub fn mkdir(&self, rel: &str) {
        fs::create_dir_all(self.root.join(rel)).expect("mkdir");
    }

    pub fn exists(&self, rel: &str) -> bool {
        self.root.join(rel).exists()
    }

    pub fn path(&self, rel: &str) -> String {
        self.root.join(rel).to_string_lossy().into_owned()
    }

    pub fn store(&self, clock: &Arc<FixedClock>) -> SegmentStore {
        SegmentStore::new("front", &self.root, fast_store_config(), clock.clone())
    }
}

pub fn write_file(root: &Path, rel: &str, size: usize) -> PathBuf {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("parent dirs");
    }
    fs::write(&path, vec![0u8; size]).expect("write segment");
    path
}

pub fn clock(datetime: &str) -> Arc<FixedClock> {
    Arc::new(FixedClock::at(datetime).expect("valid datetime"))
}

/// Live waits that give up quickly.
pub fn fast_store_config() -> StoreConfig {
    StoreConfig {
        live_poll_interval: Duration::from_millis(5),
        live_max_attempts: 2,
        ..StoreConfig::default()
    }
}
