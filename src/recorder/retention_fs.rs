// src/recorder/retention_fs.rs
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Duration, NaiveDateTime};
use log::{info, warn};

use crate::core::timestamp::{day_folder, minute_folder, parse_day_folder, parse_minute_folder};
use crate::recorder::{RetentionPolicy, RetentionReport};
use crate::store::listing::{list_files, list_names};

/// Segments this young may still be open in the writer.
const IN_FLIGHT: i64 = 2;

/// Day folder retention for a `day/hour/minute` tree (or a flat tree of
/// day folders, for event images).
pub struct FsRetention {
    base_dir: PathBuf,
    retention_days: i64,
    undersized: Option<u64>,
}

impl FsRetention {
    pub fn new(base_dir: PathBuf, retention_days: u32) -> Self {
        Self {
            base_dir,
            retention_days: retention_days as i64,
            undersized: None,
        }
    }

    /// Also delete files at or below `min_file_size` inside retained days.
    pub fn with_undersized_sweep(mut self, min_file_size: u64) -> Self {
        self.undersized = Some(min_file_size);
        self
    }

    /// Day folders sorting below this name are expired.
    pub fn cutoff(&self, now: NaiveDateTime) -> String {
        day_folder((now - Duration::days(self.retention_days)).date())
    }

    /// Deletes undersized segments and empty minute/hour folders of one day.
    ///
    /// With `protect_recent`, segments of the last minutes are left alone
    /// because the writer may still be filling them. The current and next
    /// minute folders are never removed.
    pub fn sweep_day(
        &self,
        day: &str,
        now: NaiveDateTime,
        protect_recent: bool,
        report: &mut RetentionReport,
    ) {
        let Some(min_size) = self.undersized else {
            return;
        };
        let current_minute = minute_folder(now);
        let in_flight_from = now - Duration::minutes(IN_FLIGHT);
        let day_dir = self.base_dir.join(day);

        for hour in list_names(&day_dir) {
            let hour_dir = day_dir.join(&hour);
            for minute in list_names(&hour_dir) {
                let folder = format!("{}/{}/{}", day, hour, minute);
                let minute_dir = hour_dir.join(&minute);
                let minute_start = parse_minute_folder(&folder);

                for entry in list_files(&minute_dir) {
                    if entry.size > min_size {
                        continue;
                    }
                    if protect_recent && is_recent(minute_start, &entry.name, in_flight_from) {
                        continue;
                    }
                    let path = minute_dir.join(&entry.name);
                    match fs::remove_file(&path) {
                        Ok(()) => report.removed_files += 1,
                        Err(err) => warn!("[retention] failed {:?}: {}", path, err),
                    }
                }

                if folder < current_minute && remove_if_empty(&minute_dir) {
                    report.removed_dirs += 1;
                }
            }
            if remove_if_empty(&hour_dir) {
                report.removed_dirs += 1;
            }
        }
    }
}

impl RetentionPolicy for FsRetention {
    fn run(&mut self, now: NaiveDateTime) -> anyhow::Result<RetentionReport> {
        let cutoff = self.cutoff(now);
        let mut report = RetentionReport::default();

        for name in list_names(&self.base_dir) {
            if parse_day_folder(&name).is_none() {
                continue;
            }

            if name < cutoff {
                let path = self.base_dir.join(&name);
                match fs::remove_dir_all(&path) {
                    Ok(()) => {
                        info!("[retention] removed {:?}", path);
                        report.removed_days.push(name);
                    }
                    Err(err) => {
                        warn!("[retention] failed {:?}: {}", path, err);
                    }
                }
                continue;
            }

            self.sweep_day(&name, now, true, &mut report);
        }

        if report.removed_files > 0 || report.removed_dirs > 0 {
            info!(
                "[retention] {:?}: {} undersized file(s), {} empty folder(s) removed",
                self.base_dir, report.removed_files, report.removed_dirs
            );
        }

        Ok(report)
    }
}

fn is_recent(minute_start: Option<NaiveDateTime>, file_name: &str, from: NaiveDateTime) -> bool {
    let second = file_name
        .split('.')
        .next()
        .and_then(|stem| stem.parse::<i64>().ok())
        .unwrap_or(0);
    match minute_start {
        Some(start) => start + Duration::seconds(second) >= from,
        None => false,
    }
}

fn remove_if_empty(dir: &Path) -> bool {
    fs::remove_dir(dir).is_ok()
}
