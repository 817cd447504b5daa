// src/images/events.rs
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Context;
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime};

use crate::core::timestamp::{day_folder, web_datetime};
use crate::core::{Clock, ComponentLogger, LogContext};
use crate::motion::MotionRegistry;
use crate::recorder::{FsRetention, RetentionPolicy};
use crate::store::listing::{list_files, list_names};

pub const CHECK_INTERVAL: Duration = Duration::from_secs(2);

/// Watches the folder a camera uploads event snapshots into.
///
/// Once a day it expires old folders and moves the live (last sorting)
/// folder's images into yesterday's folder. Every pass it turns the newest
/// image's modification time into the camera's motion mark.
pub struct EventsWatcher {
    key: String,
    root: PathBuf,
    retention_days: u32,
    clock: Arc<dyn Clock>,
    registry: Arc<MotionRegistry>,
    last_rotation: Option<NaiveDate>,
    last_event: Option<NaiveDateTime>,
}

impl ComponentLogger for EventsWatcher {
    fn log_context(&self) -> LogContext {
        LogContext::new("events", &self.key)
    }
}

impl EventsWatcher {
    pub fn new(
        key: impl Into<String>,
        root: impl Into<PathBuf>,
        retention_days: u32,
        clock: Arc<dyn Clock>,
        registry: Arc<MotionRegistry>,
    ) -> Self {
        Self {
            key: key.into(),
            root: root.into(),
            retention_days,
            clock,
            registry,
            last_rotation: None,
            last_event: None,
        }
    }

    pub fn tick(&mut self) -> anyhow::Result<()> {
        let now = self.clock.now();
        self.rotate(now)?;
        self.check()?;
        Ok(())
    }

    /// Daily cleanup and live folder rotation. Returns true when images
    /// were moved.
    pub fn rotate(&mut self, now: NaiveDateTime) -> anyhow::Result<bool> {
        let today = now.date();
        if self.last_rotation == Some(today) {
            return Ok(false);
        }
        self.last_rotation = Some(today);

        FsRetention::new(self.root.clone(), self.retention_days).run(now)?;

        let Some(live) = list_names(&self.root).pop() else {
            return Ok(false);
        };
        let live_dir = self.root.join(&live);
        let images = list_files(&live_dir);
        if images.is_empty() {
            return Ok(false);
        }

        let Some(yesterday) = today.pred_opt() else {
            return Ok(false);
        };
        let target = self.root.join(day_folder(yesterday));
        if target.exists() {
            return Ok(false);
        }

        fs::create_dir_all(&target).with_context(|| format!("mkdir {:?}", target))?;
        for image in &images {
            let from = live_dir.join(&image.name);
            fs::rename(&from, target.join(&image.name))
                .with_context(|| format!("move {:?}", from))?;
        }

        self.info(&format!(
            "rotation at {}: {} image(s) to {}",
            day_folder(today),
            images.len(),
            day_folder(yesterday)
        ));
        Ok(true)
    }

    /// Records the newest live image as a motion mark. The first
    /// observation only seeds the baseline.
    pub fn check(&mut self) -> anyhow::Result<Option<String>> {
        let Some(live) = list_names(&self.root).pop() else {
            return Ok(None);
        };
        let live_dir = self.root.join(live);
        let Some(newest) = list_files(&live_dir).pop() else {
            return Ok(None);
        };

        let path = live_dir.join(&newest.name);
        let modified = fs::metadata(&path)
            .and_then(|m| m.modified())
            .with_context(|| format!("mtime of {:?}", path))?;
        let at = DateTime::<Local>::from(modified).naive_local();

        if self.last_event.is_some_and(|last| at <= last) {
            return Ok(None);
        }
        let seeded = self.last_event.is_some();
        self.last_event = Some(at);

        let mark = web_datetime(at);
        self.registry.record(&self.key, &mark);
        if seeded {
            self.info(&format!("motion detected: {}", mark));
            return Ok(Some(mark));
        }
        Ok(None)
    }

    pub fn run(mut self, running: Arc<AtomicBool>) {
        self.info("start handling");
        let mut next_tick = Instant::now() + CHECK_INTERVAL;

        while running.load(Ordering::Relaxed) {
            let now = Instant::now();
            if now < next_tick {
                thread::sleep(Duration::from_millis(200).min(next_tick - now));
                continue;
            }
            next_tick = now + CHECK_INTERVAL;

            if let Err(err) = self.tick() {
                self.error(&format!("can't handle: {:#}", err));
            }
        }
    }
}

pub fn spawn_watcher(
    watcher: EventsWatcher,
    running: Arc<AtomicBool>,
) -> anyhow::Result<thread::JoinHandle<()>> {
    let name = format!("events-{}", watcher.key);
    thread::Builder::new()
        .name(name.clone())
        .spawn(move || watcher.run(running))
        .with_context(|| format!("spawning {}", name))
}
