// src/store/motion_jump.rs
//
// Playback motion detector: walk minute folders from a datetime and stop at
// the first segment noticeably larger than the recent average.

use chrono::Duration;
use log::debug;

use crate::core::timestamp::{minute_folder, parse_web_datetime, shift_minute_folder};
use crate::motion::SizeWindow;
use crate::motion::window::{effective_sensitivity, exceeds_average};

use super::Segment;
use super::path::{join, path_from_datetime};
use super::videos::SegmentStore;

impl SegmentStore {
    /// Next (or previous) motion segment relative to `datetime`.
    /// `sensitivity` is the user facing 0..100 value.
    pub fn motion_jump(&mut self, sensitivity: i32, step: i64, datetime: &str) -> Segment {
        let effective = effective_sensitivity(sensitivity);
        let sign: i64 = if step > 0 { 1 } else { -1 };

        let Some(at) = parse_web_datetime(datetime) else {
            return Segment::not_found();
        };

        let (folder, anchor) = if step.abs() >= 60 {
            (minute_folder(at + Duration::seconds(step.abs() * sign)), None)
        } else {
            (minute_folder(at), path_from_datetime(datetime))
        };

        let mut window = SizeWindow::default();
        if let Some(before) = shift_minute_folder(&folder, -60 * sign) {
            let mut seed = self.files(&before);
            if sign < 0 {
                seed.reverse();
            }
            for entry in seed.iter().filter(|e| self.is_valid(e.size)) {
                window.push(entry.size);
            }
        }

        self.detect(folder, anchor.as_deref(), &mut window, effective, sign)
    }

    fn detect(
        &mut self,
        mut folder: String,
        anchor: Option<&str>,
        window: &mut SizeWindow,
        effective: u32,
        sign: i64,
    ) -> Segment {
        let Some((first_day, last_day)) = self.day_bounds() else {
            return Segment::not_found();
        };
        let now_folder = minute_folder(self.now());

        loop {
            let day = folder.split('/').next().unwrap_or_default().to_string();
            if sign > 0 && (day > last_day || folder > now_folder) {
                return self.live(None);
            }
            if sign < 0 && day < first_day {
                return Segment::not_found();
            }

            let mut files = self.files(&folder);
            if files.is_empty() {
                match self.skip_gap(&folder, sign) {
                    Some(next) => {
                        folder = next;
                        continue;
                    }
                    None if sign > 0 => return self.live(None),
                    None => return Segment::not_found(),
                }
            }

            if sign < 0 {
                files.reverse();
            }
            for entry in &files {
                if !self.is_valid(entry.size) {
                    continue;
                }
                let average = window.mean();
                window.push(entry.size);

                let rel = join(&folder, &entry.name);
                if let Some(anchor) = anchor {
                    if (sign > 0 && rel.as_str() <= anchor) || (sign < 0 && rel.as_str() >= anchor)
                    {
                        continue;
                    }
                }

                if let Some(average) = average {
                    if exceeds_average(entry.size, average, effective) {
                        debug!(
                            "[videos] {}: motion at {} ({} > {:.0} avg)",
                            self.camera(),
                            rel,
                            entry.size,
                            average
                        );
                        return self.segment(&folder, entry);
                    }
                }
            }

            if sign > 0 && folder >= now_folder {
                return self.live(None);
            }

            match shift_minute_folder(&folder, 60 * sign) {
                Some(next) => folder = next,
                None => return Segment::not_found(),
            }
        }
    }

    /// Next minute folder holding files in the walk direction; `None` when
    /// the search gets no further.
    fn skip_gap(&mut self, folder: &str, sign: i64) -> Option<String> {
        let served_live = self.served_live();
        let found = self.nearest_file(folder, None, sign as i32);
        self.set_served_live(served_live);

        if !found.is_found() {
            return None;
        }
        let next = self.folder_of(&found.path)?;
        let progressed = if sign > 0 {
            next.as_str() > folder
        } else {
            next.as_str() < folder
        };
        progressed.then_some(next)
    }
}
