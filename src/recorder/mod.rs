// src/recorder/mod.rs

use std::time::Duration;

use chrono::NaiveDateTime;

use crate::store::MIN_FILE_SIZE;

/// No fresh segment for this long means the capture process froze.
pub const FREEZE_INTERVAL: Duration = Duration::from_secs(30);
/// How long a killed capture process gets to be reaped before restart.
pub const KILL_GRACE: Duration = Duration::from_secs(5);
/// Entries the watchdog looks at across the previous and current minute.
pub const LIVE_WINDOW: usize = 10;

#[derive(Debug, Clone)]
pub struct RecorderConfig {
    /// Global capture command template with `{url}` and `{cam_path}`.
    pub storage_command: String,
    /// Watchdog period; the minimum segment duration.
    pub watchdog_interval: Duration,
    pub freeze_interval: Duration,
    pub kill_grace: Duration,
    pub probe_timeout: Duration,
    pub min_file_size: u64,
    pub retention_days: u32,
    /// Run the daily sweep on its own thread so the watchdog never waits
    /// on a large `rm -rf`.
    pub background_retention: bool,
    /// Granularity at which the run loop notices shutdown.
    pub idle_sleep: Duration,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            storage_command: String::new(),
            watchdog_interval: Duration::from_secs(10),
            freeze_interval: FREEZE_INTERVAL,
            kill_grace: KILL_GRACE,
            probe_timeout: Duration::from_secs(2),
            min_file_size: MIN_FILE_SIZE,
            retention_days: 14,
            background_retention: true,
            idle_sleep: Duration::from_millis(200),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetentionReport {
    pub removed_days: Vec<String>,
    pub removed_files: usize,
    pub removed_dirs: usize,
}

pub trait RetentionPolicy: Send {
    fn run(&mut self, now: NaiveDateTime) -> anyhow::Result<RetentionReport>;
}

pub mod capture;
pub mod probe;
pub mod retention_fs;
pub mod supervisor;

pub use capture::CaptureProcess;
pub use retention_fs::FsRetention;
pub use supervisor::{RecordingSupervisor, StartOutcome, TickOutcome};
