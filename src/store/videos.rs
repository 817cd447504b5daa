// src/store/videos.rs

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::sleep;

use chrono::{Duration, NaiveDateTime};
use log::debug;

use crate::core::Clock;
use crate::core::timestamp::{
    minute_folder, parse_day_folder, parse_web_datetime, shift_minute_folder,
};
use crate::motion::MotionRegistry;

use super::listing::{Entry, list_files, list_names};
use super::path::{self, join, path_from_datetime, split_last};
use super::{LIVE_RANGE, MAX_RANGE, Segment, SegmentRequest, StoreConfig, ladder_step};

/// Where to start reading inside a minute folder.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Pick {
    /// First valid file, scanning forward.
    First,
    /// Start `n` files from the end and scan backward for a valid one.
    FromEnd(usize),
}

/// Resolves playback requests for one camera against its segment tree.
///
/// Cheap to build; meant to live for a single request. The only state is
/// the cached root (day) listing and whether the last answer came from the
/// live mode.
pub struct SegmentStore {
    camera: String,
    root: PathBuf,
    cfg: StoreConfig,
    clock: Arc<dyn Clock>,
    root_folders: Option<Vec<String>>,
    served_live: bool,
}

impl SegmentStore {
    pub fn new(
        camera: impl Into<String>,
        root: impl Into<PathBuf>,
        cfg: StoreConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            camera: camera.into(),
            root: root.into(),
            cfg,
            clock,
            root_folders: None,
            served_live: false,
        }
    }

    pub fn camera(&self) -> &str {
        &self.camera
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn get(&mut self, req: &SegmentRequest) -> Segment {
        match req {
            SegmentRequest::Live { after } => self.live(after.as_deref()),
            SegmentRequest::Range(rng) => self.by_range(*rng),
            SegmentRequest::Next {
                step,
                datetime,
                sensitivity,
            } => self.next(*step, datetime, *sensitivity),
        }
    }

    // ------------------------------------------------------------------
    // Modes
    // ------------------------------------------------------------------

    /// Most recent complete segment. With `after`, polls (bounded) until a
    /// segment newer than that datetime shows up.
    pub fn live(&mut self, after: Option<&str>) -> Segment {
        self.served_live = true;

        let attempts = self.cfg.live_max_attempts.max(1);
        for attempt in 1..=attempts {
            let segment = self.live_file();
            if !segment.is_found() {
                let fallback = minute_folder(self.now() - Duration::minutes(1));
                let (parent, minute) = split_last(&fallback);
                return self.nearest_file(parent, Some(minute), -1);
            }

            let fresh = match after {
                Some(after) if !after.is_empty() && self.cfg.storage_enabled => {
                    self.datetime_from_path(&segment.path).as_str() > after
                }
                _ => true,
            };
            if fresh {
                return segment;
            }

            if attempt < attempts {
                sleep(self.cfg.live_poll_interval);
            }
        }

        debug!(
            "[videos] {}: no live segment newer than {:?}",
            self.camera, after
        );
        Segment::not_found()
    }

    /// Scrollbar position to segment.
    pub fn by_range(&mut self, rng: i64) -> Segment {
        let rng = rng.clamp(0, MAX_RANGE);
        if rng == MAX_RANGE {
            return self.live(None);
        }

        let Some(start) = self.start_date() else {
            return Segment::not_found();
        };
        let elapsed = (self.now() - start).num_seconds().max(0);
        let delta_minutes = elapsed * rng / (MAX_RANGE * 60);
        let target = minute_folder(start + Duration::minutes(delta_minutes));

        let (parent, minute) = split_last(&target);
        self.nearest_file(parent, Some(minute), 1)
    }

    /// Step relative to `datetime` (or jump to motion with a sensitivity).
    pub fn next(&mut self, raw_step: i64, datetime: &str, sensitivity: Option<i32>) -> Segment {
        if datetime.is_empty() {
            return self.live(None);
        }
        let Some(file_path) = path_from_datetime(datetime) else {
            debug!("[videos] {}: malformed datetime {:?}", self.camera, datetime);
            return Segment::not_found();
        };

        let step = ladder_step(raw_step);
        if let Some(sensitivity) = sensitivity.filter(|s| *s >= 0) {
            return self.motion_jump(sensitivity, step, datetime);
        }

        let sign = if step > 0 { 1 } else { -1 };
        let (wd, _) = split_last(&file_path);

        if step.abs() < 10 {
            if let Some(adjacent) = shift_minute_folder(wd, 60 * sign) {
                let folders = if sign < 0 {
                    [adjacent, wd.to_string()]
                } else {
                    [wd.to_string(), adjacent]
                };
                if let Some(segment) = self.step_through(&folders, &file_path, step) {
                    return segment;
                }
            }
        }

        let seconds = step.abs().max(60);
        let Some(folder) = shift_minute_folder(wd, seconds * sign) else {
            return Segment::not_found();
        };

        if sign > 0 && folder > minute_folder(self.now()) {
            return self.live(Some(datetime));
        }

        let (parent, minute) = split_last(&folder);
        self.nearest_file(parent, Some(minute), sign as i32)
    }

    /// Segment at (or right after) the camera's last motion mark.
    pub fn last_motion(&mut self, registry: &MotionRegistry) -> Segment {
        let Some(mark) = registry.get(&self.camera) else {
            return Segment::not_found();
        };
        let Some(rel) = path_from_datetime(&mark) else {
            return Segment::not_found();
        };
        let (folder, name) = split_last(&rel);

        let min_size = self.cfg.min_file_size;
        if let Some(entry) = self
            .files(folder)
            .into_iter()
            .find(|e| e.name.as_str() >= name && e.size > min_size)
        {
            return self.segment(folder, &entry);
        }

        let Some(next_minute) = shift_minute_folder(folder, 60) else {
            return Segment::not_found();
        };
        let (parent, minute) = split_last(&next_minute);
        self.nearest_file(parent, Some(minute), 1)
    }

    // ------------------------------------------------------------------
    // Path metadata
    // ------------------------------------------------------------------

    pub fn datetime_from_path(&self, path: &str) -> String {
        path::datetime_from_path(&self.root, path)
    }

    /// Scrollbar position of a segment; the live sentinel after live
    /// answers.
    pub fn range_from_path(&mut self, path: &str) -> Option<i64> {
        if self.served_live {
            return Some(LIVE_RANGE);
        }

        let start = self.start_date()?;
        let at = parse_web_datetime(&self.datetime_from_path(path))?;
        let total = (self.now() - start).num_seconds();
        if total <= 0 {
            return Some(MAX_RANGE);
        }
        let delta = (at - start).num_seconds();
        Some((MAX_RANGE as f64 * delta as f64 / total as f64).round() as i64)
    }

    pub fn served_live(&self) -> bool {
        self.served_live
    }

    // ------------------------------------------------------------------
    // Internals shared with search / motion_jump
    // ------------------------------------------------------------------

    pub(crate) fn now(&self) -> NaiveDateTime {
        self.clock.now()
    }

    pub(crate) fn is_valid(&self, size: u64) -> bool {
        size > self.cfg.min_file_size
    }

    pub(crate) fn set_served_live(&mut self, served_live: bool) {
        self.served_live = served_live;
    }

    /// Child names of a relative folder; the root listing only keeps day
    /// folders and is cached.
    pub(crate) fn folders(&mut self, folder: &str) -> Vec<String> {
        if !folder.is_empty() {
            return list_names(&self.root.join(folder));
        }
        if let Some(cached) = &self.root_folders {
            return cached.clone();
        }
        let days: Vec<String> = list_names(&self.root)
            .into_iter()
            .filter(|name| parse_day_folder(name).is_some())
            .collect();
        self.root_folders = Some(days.clone());
        days
    }

    pub(crate) fn files(&self, folder: &str) -> Vec<Entry> {
        list_files(&self.root.join(folder))
    }

    pub(crate) fn segment(&self, folder: &str, entry: &Entry) -> Segment {
        let full = self.root.join(folder).join(&entry.name);
        Segment::new(full.to_string_lossy(), entry.size)
    }

    /// Relative minute folder of a full segment path.
    pub(crate) fn folder_of(&self, full_path: &str) -> Option<String> {
        let relative = Path::new(full_path).strip_prefix(&self.root).ok()?;
        let parent = relative.parent()?;
        Some(parent.to_string_lossy().into_owned())
    }

    /// First and last day folder.
    pub(crate) fn day_bounds(&mut self) -> Option<(String, String)> {
        let days = self.folders("");
        Some((days.first()?.clone(), days.last()?.clone()))
    }

    pub(crate) fn pick_file(&self, folder: &str, pick: Pick) -> Segment {
        let files = self.files(folder);
        let found = match pick {
            Pick::First => files.iter().find(|e| self.is_valid(e.size)),
            Pick::FromEnd(n) => {
                if n == 0 || files.len() < n {
                    None
                } else {
                    files[..=files.len() - n]
                        .iter()
                        .rev()
                        .find(|e| self.is_valid(e.size))
                }
            }
        };
        match found {
            Some(entry) => self.segment(folder, entry),
            None => Segment::not_found(),
        }
    }

    /// Newest complete file, skipping the one still being written.
    pub(crate) fn live_file(&self) -> Segment {
        let now = self.now();
        let folder = minute_folder(now);
        let files = self.files(&folder);

        if files.len() > 1 {
            let entry = &files[files.len() - 2];
            if !self.is_valid(entry.size) {
                return Segment::not_found();
            }
            return self.segment(&folder, entry);
        }

        // Writer is in the current minute: the previous minute's last file
        // is complete. Nothing here yet: its last file may still be open.
        let from_end = if files.len() == 1 { 1 } else { 2 };
        let previous = minute_folder(now - Duration::minutes(1));
        self.pick_file(&previous, Pick::FromEnd(from_end))
    }

    // ------------------------------------------------------------------

    fn start_date(&mut self) -> Option<NaiveDateTime> {
        let days = self.folders("");
        parse_day_folder(days.first()?)
    }

    /// The `|step|`-th valid file strictly past `from` across `folders`.
    fn step_through(&self, folders: &[String], from: &str, step: i64) -> Option<Segment> {
        let mut files: Vec<(String, Entry)> = Vec::new();
        for folder in folders {
            for entry in self.files(folder) {
                files.push((folder.clone(), entry));
            }
        }
        if files.len() <= step.unsigned_abs() as usize {
            return None;
        }
        if step < 0 {
            files.reverse();
        }

        let mut passed = 0;
        for (folder, entry) in &files {
            let rel = join(folder, &entry.name);
            if (step > 0 && rel.as_str() <= from) || (step < 0 && rel.as_str() >= from) {
                continue;
            }
            passed += 1;
            if passed < step.abs() {
                continue;
            }
            if self.is_valid(entry.size) {
                return Some(self.segment(folder, entry));
            }
        }
        None
    }
}
