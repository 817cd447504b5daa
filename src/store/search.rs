// src/store/search.rs
//
// Nearest-file search over the sparse `day/hour/minute` tree.
//
// The cursor is a stack of at most DEPTH components plus an optional
// target at the next level. "Shift left" pops a component and makes it the
// target; "shift right" descends into a child. Targets only ever move in
// the search direction and the backward search wraps at most once, so the
// walk terminates; MAX_SEARCH_STEPS is a hard backstop.

use chrono::Duration;
use log::warn;

use crate::core::timestamp::minute_folder;

use super::Segment;
use super::path::{DEPTH, split_last};
use super::videos::{Pick, SegmentStore};

const MAX_SEARCH_STEPS: usize = 100_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchOutcome {
    pub segment: Segment,
    /// Loop iterations the walk needed.
    pub steps: usize,
}

impl SegmentStore {
    /// Closest valid segment to `parent[/target]` in the direction of
    /// `step` (negative: backward, otherwise forward).
    pub fn nearest_file(&mut self, parent: &str, target: Option<&str>, step: i32) -> Segment {
        self.search(parent, target, step).segment
    }

    pub fn search(&mut self, parent: &str, target: Option<&str>, step: i32) -> SearchOutcome {
        self.walk(parent, target, step, true)
    }

    /// Same as the live mode: the newest complete file, else the closest
    /// one before the previous minute. The backward walk may not hand off
    /// to live again.
    fn live_fallback(&mut self) -> SearchOutcome {
        self.set_served_live(true);
        let segment = self.live_file();
        if segment.is_found() {
            return SearchOutcome { segment, steps: 0 };
        }
        let previous = minute_folder(self.now() - Duration::minutes(1));
        let (parent, minute) = split_last(&previous);
        self.walk(parent, Some(minute), -1, false)
    }

    fn walk(
        &mut self,
        parent: &str,
        target: Option<&str>,
        step: i32,
        live_fallback: bool,
    ) -> SearchOutcome {
        let mut parts: Vec<String> = parent
            .split('/')
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect();
        let requested = target.unwrap_or("");
        let mut target: Option<String> = target.filter(|t| !t.is_empty()).map(str::to_string);
        let mut forward = step >= 0;

        if parts.len() >= DEPTH {
            parts.truncate(DEPTH);
            target = None;
        }

        let mut wrapped = false;
        let mut leaf_exhausted = false;
        let mut steps = 0;

        while steps < MAX_SEARCH_STEPS {
            steps += 1;
            let depth = parts.len();

            // Minute folder: try to read a file directly.
            let at_leaf = match target {
                Some(_) => depth == DEPTH - 1,
                None => depth == DEPTH,
            };
            if at_leaf && !leaf_exhausted {
                let mut leaf = parts.join("/");
                if let Some(t) = &target {
                    leaf = super::path::join(&leaf, t);
                }
                let pick = if forward { Pick::First } else { Pick::FromEnd(1) };
                let segment = self.pick_file(&leaf, pick);
                if segment.is_found() {
                    return SearchOutcome { segment, steps };
                }
                if target.is_none() {
                    // Descended into a minute without a usable file.
                    target = parts.pop();
                    leaf_exhausted = true;
                    continue;
                }
            }
            leaf_exhausted = false;

            let children = self.folders(&parts.join("/"));
            if children.is_empty() && depth > 0 {
                target = parts.pop();
                continue;
            }

            if let Some(t) = target.take() {
                let closest = if forward {
                    children.iter().filter(|c| c.as_str() > t.as_str()).min()
                } else {
                    children.iter().filter(|c| c.as_str() < t.as_str()).max()
                };
                if let Some(child) = closest {
                    parts.push(child.clone());
                    continue;
                }
                if depth > 0 {
                    target = parts.pop();
                    continue;
                }
                if !forward && !wrapped {
                    // Nothing earlier: start over from the very beginning.
                    wrapped = true;
                    forward = true;
                    continue;
                }
                if forward && live_fallback {
                    // Nothing later: the newest recording is what's left.
                    let outcome = self.live_fallback();
                    return SearchOutcome {
                        segment: outcome.segment,
                        steps: steps + outcome.steps,
                    };
                }
                break;
            }

            if !children.is_empty() && depth < DEPTH {
                let child = if forward {
                    children.first()
                } else {
                    children.last()
                };
                if let Some(child) = child {
                    parts.push(child.clone());
                    continue;
                }
            }

            break;
        }

        warn!(
            "[videos] {}: find_nearest_file: not found: {}[/{}], step={}",
            self.camera(),
            parent,
            requested,
            step
        );
        SearchOutcome {
            segment: Segment::not_found(),
            steps,
        }
    }
}
