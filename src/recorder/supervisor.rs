// src/recorder/supervisor.rs
use std::fs;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Context;
use chrono::{NaiveDate, NaiveDateTime};

use crate::core::timestamp::{day_folder, minute_folder, parse_web_datetime};
use crate::core::{CaptureResult, Clock, ComponentLogger, LogContext};
use crate::motion::MotionRegistry;
use crate::motion::window::exceeds_multiplier;
use crate::store::listing::list_files;
use crate::store::path::{datetime_from_path, join};

use super::capture::{CaptureProcess, build_command};
use super::probe::{camera_address, is_reachable, resolve};
use super::retention_fs::FsRetention;
use super::{LIVE_WINDOW, RecorderConfig, RetentionPolicy, RetentionReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Launched { pid: u32 },
    /// Camera did not answer the probe; nothing was spawned.
    Offline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Healthy,
    /// Freeze handled: process stopped and a restart attempted.
    Restarted,
}

/// `(relative path, size)` of a segment seen by the watchdog.
pub type RecentEntry = (String, u64);

/// No fresh segment and a process that is either missing or older than
/// the freeze interval.
pub fn is_frozen(
    fresh_entries: usize,
    started_at: Option<NaiveDateTime>,
    now: NaiveDateTime,
    freeze_interval: Duration,
) -> bool {
    if fresh_entries > 0 {
        return false;
    }
    match started_at {
        Some(started) => (now - started).to_std().unwrap_or_default() >= freeze_interval,
        None => true,
    }
}

/// Entries whose path timestamp lies within `freeze_interval` of `now`.
pub fn count_fresh(entries: &[RecentEntry], now: NaiveDateTime, freeze_interval: Duration) -> usize {
    let Ok(window) = chrono::Duration::from_std(freeze_interval) else {
        return 0;
    };
    let since = now - window;
    entries
        .iter()
        .filter_map(|(rel, _)| entry_time(rel))
        .filter(|at| *at >= since)
        .count()
}

/// Live detector over completed entries (oldest first): the newest one is
/// the candidate, the valid sizes before it are the baseline. Returns the
/// candidate's path when it is `sensitivity` times the baseline mean.
pub fn detect_live_motion<'a>(
    completed: &'a [RecentEntry],
    sensitivity: f64,
    min_file_size: u64,
) -> Option<&'a str> {
    if sensitivity <= 1.0 {
        return None;
    }
    let ((candidate, size), priors) = completed.split_last()?;
    if *size <= min_file_size {
        return None;
    }

    let valid: Vec<u64> = priors
        .iter()
        .rev()
        .take(LIVE_WINDOW - 1)
        .map(|(_, size)| *size)
        .filter(|size| *size > min_file_size)
        .collect();
    if valid.is_empty() {
        return None;
    }
    let mean = valid.iter().sum::<u64>() as f64 / valid.len() as f64;

    exceeds_multiplier(*size, mean, sensitivity).then_some(candidate.as_str())
}

fn entry_mark(rel: &str) -> String {
    datetime_from_path(Path::new(""), rel)
}

fn entry_time(rel: &str) -> Option<NaiveDateTime> {
    parse_web_datetime(&entry_mark(rel))
}

/// Keeps the capture process of one camera alive.
pub struct RecordingSupervisor {
    key: String,
    root: PathBuf,
    url: String,
    command: String,
    sensitivity: Option<f64>,
    cfg: RecorderConfig,
    clock: Arc<dyn Clock>,
    registry: Arc<MotionRegistry>,
    capture: Option<CaptureProcess>,
    last_retention: Option<NaiveDate>,
}

impl ComponentLogger for RecordingSupervisor {
    fn log_context(&self) -> LogContext {
        LogContext::new("storage", &self.key)
    }
}

impl RecordingSupervisor {
    pub fn new(
        key: impl Into<String>,
        root: impl Into<PathBuf>,
        url: impl Into<String>,
        cfg: RecorderConfig,
        clock: Arc<dyn Clock>,
        registry: Arc<MotionRegistry>,
    ) -> Self {
        let command = cfg.storage_command.clone();
        Self {
            key: key.into(),
            root: root.into(),
            url: url.into(),
            command,
            sensitivity: None,
            cfg,
            clock,
            registry,
            capture: None,
            last_retention: None,
        }
    }

    /// Per camera command template replacing the global one.
    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = command.into();
        self
    }

    pub fn with_sensitivity(mut self, sensitivity: Option<f64>) -> Self {
        self.sensitivity = sensitivity;
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn pid(&self) -> Option<u32> {
        self.capture.as_ref().map(CaptureProcess::pid)
    }

    /// Launches the capture process (stopping a previous one first).
    pub fn start(&mut self) -> CaptureResult<StartOutcome> {
        self.stop_capture();

        let address = camera_address(&self.url)?;
        let now = self.clock.now();
        self.mkdir(&minute_folder(now))?;

        let addr = resolve(&address)?;
        if !is_reachable(&addr, self.cfg.probe_timeout) {
            self.warn(&format!("offline: {}", address));
            return Ok(StartOutcome::Offline);
        }

        let argv = build_command(&self.command, &self.url, &self.root)?;
        let process = CaptureProcess::spawn(&argv, now)?;
        let pid = process.pid();
        self.info(&format!("start main process {} ({})", pid, address));
        self.capture = Some(process);

        Ok(StartOutcome::Launched { pid })
    }

    /// One watchdog pass.
    pub fn tick(&mut self) -> anyhow::Result<TickOutcome> {
        let now = self.clock.now();

        self.mkdir(&minute_folder(now + chrono::Duration::minutes(1)))?;
        self.daily_retention(now);

        let recent = self.recent_entries(now);
        if let Some((_, completed)) = recent.split_last() {
            self.detect_motion(completed);
        }

        let fresh = count_fresh(&recent, now, self.cfg.freeze_interval);
        let started_at = self.running_since();
        if !is_frozen(fresh, started_at, now, self.cfg.freeze_interval) {
            return Ok(TickOutcome::Healthy);
        }

        if started_at.is_some() {
            self.warn(&format!(
                "freeze: no segment for {:?}, restarting",
                self.cfg.freeze_interval
            ));
        } else {
            self.debug("capture not running, starting");
        }
        self.stop_capture();
        self.remove_undersized_today(now);

        if let Err(err) = self.start() {
            self.error(&format!("start failed: {}", err));
        }

        self.remove_empty_ancestors(now - chrono::Duration::minutes(1));
        Ok(TickOutcome::Restarted)
    }

    /// Blocks until `running` goes false, then stops the capture process.
    pub fn run(mut self, running: Arc<AtomicBool>) {
        if let Err(err) = self.start() {
            self.error(&format!("start failed: {}", err));
        }

        let mut next_tick = Instant::now() + self.cfg.watchdog_interval;
        while running.load(Ordering::Relaxed) {
            let now = Instant::now();
            if now < next_tick {
                thread::sleep(self.cfg.idle_sleep.min(next_tick - now));
                continue;
            }
            next_tick = now + self.cfg.watchdog_interval;

            match catch_unwind(AssertUnwindSafe(|| self.tick())) {
                Ok(Ok(_)) => {}
                Ok(Err(err)) => self.error(&format!("watchdog: {:#}", err)),
                Err(_) => self.error("watchdog: tick panicked"),
            }
        }

        self.stop_capture();
        self.info("stopped");
    }

    pub fn shutdown(&mut self) {
        self.stop_capture();
    }

    /// Start time of a capture process that is still alive.
    fn running_since(&mut self) -> Option<NaiveDateTime> {
        let process = self.capture.as_mut()?;
        if process.has_exited() {
            return None;
        }
        Some(process.started_at())
    }

    fn stop_capture(&mut self) {
        let Some(mut process) = self.capture.take() else {
            return;
        };
        let pid = process.pid();
        match process.stop(self.cfg.kill_grace) {
            Ok(()) => self.debug(&format!("stopped process {}", pid)),
            Err(err) => self.error(&format!("{}", err)),
        }
    }

    fn mkdir(&self, folder: &str) -> CaptureResult<()> {
        let dir = self.root.join(folder);
        fs::create_dir_all(&dir)
            .map_err(|e| crate::core::CaptureError::io(format!("mkdir {:?}", dir), e))
    }

    /// Last entries across the previous and current minute, oldest first.
    fn recent_entries(&self, now: NaiveDateTime) -> Vec<RecentEntry> {
        let mut entries = Vec::new();
        for at in [now - chrono::Duration::minutes(1), now] {
            let folder = minute_folder(at);
            for entry in list_files(&self.root.join(&folder)) {
                entries.push((join(&folder, &entry.name), entry.size));
            }
        }
        let skip = entries.len().saturating_sub(LIVE_WINDOW);
        entries.split_off(skip)
    }

    fn detect_motion(&self, completed: &[RecentEntry]) {
        let Some(sensitivity) = self.sensitivity else {
            return;
        };
        let Some(candidate) = detect_live_motion(completed, sensitivity, self.cfg.min_file_size)
        else {
            return;
        };

        let mark = entry_mark(candidate);
        if self.registry.record(&self.key, &mark) {
            self.info(&format!("motion detected: {}", mark));
        }
    }

    fn daily_retention(&mut self, now: NaiveDateTime) {
        let today = now.date();
        if self.last_retention == Some(today) {
            return;
        }
        self.last_retention = Some(today);

        let mut retention = FsRetention::new(self.root.clone(), self.cfg.retention_days)
            .with_undersized_sweep(self.cfg.min_file_size);
        let ctx = self.log_context().with_scope("retention");

        if self.cfg.background_retention {
            let spawned = thread::Builder::new()
                .name(format!("retention-{}", self.key))
                .spawn(move || match retention.run(now) {
                    Ok(report) if !report.removed_days.is_empty() => {
                        log::info!("{}", ctx.format(&format!("removed {:?}", report.removed_days)));
                    }
                    Ok(_) => {}
                    Err(err) => log::error!("{}", ctx.format(&format!("{:#}", err))),
                });
            if let Err(err) = spawned {
                self.error(&format!("retention thread: {}", err));
            }
        } else if let Err(err) = retention.run(now) {
            self.error(&format!("retention: {:#}", err));
        }
    }

    fn remove_undersized_today(&self, now: NaiveDateTime) {
        let retention = FsRetention::new(self.root.clone(), self.cfg.retention_days)
            .with_undersized_sweep(self.cfg.min_file_size);
        let mut report = RetentionReport::default();
        retention.sweep_day(&day_folder(now.date()), now, false, &mut report);
        if report.removed_files > 0 {
            self.debug(&format!("removed {} undersized file(s)", report.removed_files));
        }
    }

    /// Minute, hour, then day folder of `at`, each only while empty.
    fn remove_empty_ancestors(&self, at: NaiveDateTime) {
        let minute = minute_folder(at);
        let mut folder = minute.as_str();
        loop {
            let dir = self.root.join(folder);
            if fs::remove_dir(&dir).is_err() {
                break;
            }
            self.debug(&format!("removed empty {}", folder));
            match folder.rsplit_once('/') {
                Some((parent, _)) => folder = parent,
                None => break,
            }
        }
    }
}

impl Drop for RecordingSupervisor {
    fn drop(&mut self) {
        self.stop_capture();
    }
}

/// Spawns the supervisor on its own named thread.
pub fn spawn_supervisor(
    supervisor: RecordingSupervisor,
    running: Arc<AtomicBool>,
) -> anyhow::Result<thread::JoinHandle<()>> {
    let name = format!("storage-{}", supervisor.key());
    thread::Builder::new()
        .name(name.clone())
        .spawn(move || supervisor.run(running))
        .with_context(|| format!("spawning {}", name))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(s: &str) -> NaiveDateTime {
        parse_web_datetime(s).unwrap()
    }

    #[test]
    fn test_freeze_boundary() {
        let now = at("20240110120100");
        let freeze = Duration::from_secs(30);

        assert!(!is_frozen(0, Some(at("20240110120031")), now, freeze));
        assert!(is_frozen(0, Some(at("20240110120029")), now, freeze));
        assert!(is_frozen(0, None, now, freeze));
        assert!(!is_frozen(1, None, now, freeze));
    }

    #[test]
    fn test_count_fresh() {
        let now = at("20240110120100");
        let entries = vec![
            ("2024-01-10/12/00/20.mp4".to_string(), 5000),
            ("2024-01-10/12/00/30.mp4".to_string(), 5000),
            ("2024-01-10/12/00/40.mp4".to_string(), 5000),
        ];
        assert_eq!(count_fresh(&entries, now, Duration::from_secs(30)), 2);
        assert_eq!(count_fresh(&entries, now, Duration::from_secs(10)), 0);
    }

    fn entries(sizes: &[u64]) -> Vec<RecentEntry> {
        sizes
            .iter()
            .enumerate()
            .map(|(i, size)| (format!("2024-01-10/12/00/{:02}.mp4", i * 5), *size))
            .collect()
    }

    #[test]
    fn test_live_motion_multiplier() {
        let completed = entries(&[2000, 2000, 2000, 4001]);
        assert_eq!(
            detect_live_motion(&completed, 2.0, 1000),
            Some("2024-01-10/12/00/15.mp4")
        );

        let completed = entries(&[2000, 2000, 2000, 4000]);
        assert_eq!(detect_live_motion(&completed, 2.0, 1000), None);
    }

    #[test]
    fn test_live_motion_ignores_undersized_baseline() {
        let completed = entries(&[500, 2000, 10, 4500]);
        assert!(detect_live_motion(&completed, 2.0, 1000).is_some());

        let completed = entries(&[500, 600, 5000]);
        assert_eq!(detect_live_motion(&completed, 2.0, 1000), None);
    }

    #[test]
    fn test_live_motion_disabled() {
        let completed = entries(&[2000, 2000, 90000]);
        assert_eq!(detect_live_motion(&completed, 1.0, 1000), None);
        assert_eq!(detect_live_motion(&completed, 0.5, 1000), None);
    }
}
