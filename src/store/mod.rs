// src/store/mod.rs
//
// Filesystem backed segment index. Positions live only in directory and
// file names (`YYYY-MM-DD/HH/MM/SS.mp4`); nothing is persisted.

use std::time::Duration;

pub mod listing;
pub mod motion_jump;
pub mod path;
pub mod search;
pub mod videos;

pub use listing::Entry;
pub use path::{datetime_from_path, path_from_datetime};
pub use search::SearchOutcome;
pub use videos::SegmentStore;

/// Upper bound of the virtual scrollbar.
pub const MAX_RANGE: i64 = 2000;
/// Range reported for segments served by the live mode.
pub const LIVE_RANGE: i64 = MAX_RANGE + 1;
/// Files at or below this size are partial or broken.
pub const MIN_FILE_SIZE: u64 = 1000;
/// Step ladder in seconds, indexed by `abs(raw step) - 1`.
pub const STEP_LADDER: [i64; 4] = [1, 60, 600, 3600];

/// A resolved segment. An empty path with size 0 means "nothing to show".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Segment {
    pub path: String,
    pub size: u64,
}

impl Segment {
    pub fn new(path: impl Into<String>, size: u64) -> Self {
        Self {
            path: path.into(),
            size,
        }
    }

    pub fn not_found() -> Self {
        Self::default()
    }

    pub fn is_found(&self) -> bool {
        !self.path.is_empty() && self.size > 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SegmentRequest {
    /// Most recent complete segment; with `after`, wait (bounded) for one
    /// newer than that datetime.
    Live { after: Option<String> },
    /// Scrollbar position `0..=MAX_RANGE`.
    Range(i64),
    /// Relative step from `datetime`; with a sensitivity, jump to the next
    /// motion instead.
    Next {
        step: i64,
        datetime: String,
        sensitivity: Option<i32>,
    },
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub min_file_size: u64,
    pub live_poll_interval: Duration,
    pub live_max_attempts: u32,
    /// Without a running recorder there is no point waiting for fresh
    /// live segments.
    pub storage_enabled: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            min_file_size: MIN_FILE_SIZE,
            live_poll_interval: Duration::from_millis(500),
            live_max_attempts: 20,
            storage_enabled: true,
        }
    }
}

/// Signed step in seconds for a raw client step.
pub fn ladder_step(raw: i64) -> i64 {
    let idx = raw.unsigned_abs().clamp(1, STEP_LADDER.len() as u64) as usize - 1;
    let step = STEP_LADDER[idx];
    if raw < 0 { -step } else { step }
}
