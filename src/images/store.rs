// src/images/store.rs
use std::path::{Path, PathBuf};

use crate::store::listing::{Entry, list_files, list_names};
use crate::store::{LIVE_RANGE, MAX_RANGE};

/// Range reported for the very first image.
pub const FIRST_RANGE: i64 = -1;

/// `folder_idx.file_idx` inside the events tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub folder: i64,
    pub file: i64,
}

impl Position {
    /// Newest image; what clients send before they have a position.
    pub const LAST: Position = Position { folder: -1, file: -1 };

    pub fn new(folder: i64, file: i64) -> Self {
        Self { folder, file }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let (folder, file) = value.split_once('.')?;
        Some(Self {
            folder: folder.trim().parse().ok()?,
            file: file.trim().parse().ok()?,
        })
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.folder, self.file)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageRequest {
    Next { step: i64, pos: Option<Position> },
    Range { rng: i64, pos: Option<Position> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFrame {
    pub path: String,
    pub size: u64,
    /// Empty when nothing was found.
    pub position: String,
    pub range: i64,
}

impl ImageFrame {
    pub fn not_found(range: i64) -> Self {
        Self {
            path: String::new(),
            size: 0,
            position: String::new(),
            range,
        }
    }

    pub fn is_found(&self) -> bool {
        !self.path.is_empty()
    }
}

/// Snapshot navigation for one camera's events folder. Images are
/// addressed by folder and file index rather than by time.
pub struct EventImageStore {
    camera: String,
    root: PathBuf,
    root_folders: Option<Vec<String>>,
}

impl EventImageStore {
    pub fn new(camera: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            camera: camera.into(),
            root: root.into(),
            root_folders: None,
        }
    }

    pub fn camera(&self) -> &str {
        &self.camera
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn get(&mut self, req: &ImageRequest) -> ImageFrame {
        match req {
            ImageRequest::Next { step, pos } => self.next(*step, pos.unwrap_or(Position::LAST)),
            ImageRequest::Range { rng, pos } => self.by_range(*rng, *pos),
        }
    }

    /// Images per folder, oldest folder first.
    pub fn chart_data(&mut self) -> Vec<usize> {
        self.folders()
            .iter()
            .map(|folder| self.files(folder).len())
            .collect()
    }

    pub fn next(&mut self, step: i64, pos: Position) -> ImageFrame {
        if step == 0 {
            return self.last();
        }
        let folders = self.folders();
        if folders.is_empty() {
            return ImageFrame::not_found(LIVE_RANGE);
        }
        let last_folder = folders.len() as i64 - 1;

        let mut folder_idx = if (0..=last_folder).contains(&pos.folder) {
            pos.folder
        } else {
            last_folder
        };
        let files = self.files(&folders[folder_idx as usize]);
        let last_file = files.len() as i64 - 1;
        let file_idx = if (0..=last_file).contains(&pos.file) {
            pos.file
        } else {
            last_file
        };

        let moved = file_idx + step;
        if !files.is_empty() && (0..=last_file).contains(&moved) {
            return self.frame(&folders, &files, folder_idx, moved);
        }

        // Past the folder edge: neighbouring folder's last (backward) or
        // first (forward) image, skipping empty folders.
        let sign = step.signum();
        loop {
            folder_idx += sign;
            if folder_idx < 0 {
                return self.first();
            }
            if folder_idx > last_folder {
                return self.last();
            }
            let files = self.files(&folders[folder_idx as usize]);
            if files.is_empty() {
                continue;
            }
            let file_idx = if sign < 0 { files.len() as i64 - 1 } else { 0 };
            return self.frame(&folders, &files, folder_idx, file_idx);
        }
    }

    /// Scrollbar position to image. Returns not-found when the position
    /// did not change, so the client keeps what it shows.
    pub fn by_range(&mut self, rng: i64, pos: Option<Position>) -> ImageFrame {
        let rng = rng.clamp(0, MAX_RANGE - 1);
        let folders = self.folders();
        if folders.is_empty() {
            return ImageFrame::not_found(rng);
        }

        let per_folder = (MAX_RANGE / folders.len() as i64).max(1);
        let folder_idx = (rng / per_folder).min(folders.len() as i64 - 1);
        let files = self.files(&folders[folder_idx as usize]);
        if files.is_empty() {
            return ImageFrame::not_found(rng);
        }

        let fraction = (rng as f64 / per_folder as f64 - folder_idx as f64).clamp(0.0, 1.0);
        let file_idx = ((fraction * files.len() as f64) as i64).min(files.len() as i64 - 1);

        if pos == Some(Position::new(folder_idx, file_idx)) {
            return ImageFrame::not_found(rng);
        }
        self.frame(&folders, &files, folder_idx, file_idx)
    }

    pub fn last(&mut self) -> ImageFrame {
        self.edge(true)
    }

    pub fn first(&mut self) -> ImageFrame {
        self.edge(false)
    }

    fn edge(&mut self, newest: bool) -> ImageFrame {
        let sentinel = if newest { LIVE_RANGE } else { FIRST_RANGE };
        let folders = self.folders();
        if folders.is_empty() {
            return ImageFrame::not_found(sentinel);
        }

        let mut folder_idx = if newest { folders.len() - 1 } else { 0 };
        let mut files = self.files(&folders[folder_idx]);
        // Freshly rotated live folder: fall back to its neighbour.
        if files.is_empty() && folders.len() > 1 {
            folder_idx = if newest { folders.len() - 2 } else { 1 };
            files = self.files(&folders[folder_idx]);
        }

        let Some(entry) = (if newest { files.last() } else { files.first() }) else {
            return ImageFrame::not_found(sentinel);
        };
        let file_idx = if newest { files.len() - 1 } else { 0 };

        ImageFrame {
            path: self.image_path(&folders[folder_idx], entry),
            size: entry.size,
            position: Position::new(folder_idx as i64, file_idx as i64).to_string(),
            range: sentinel,
        }
    }

    fn frame(&self, folders: &[String], files: &[Entry], folder_idx: i64, file_idx: i64) -> ImageFrame {
        let last_folder = folders.len() as i64 - 1;
        let last_file = files.len() as i64 - 1;

        let per_folder = MAX_RANGE as f64 / folders.len() as f64;
        let per_file = per_folder / files.len() as f64;
        let range = if folder_idx >= last_folder && file_idx >= last_file {
            LIVE_RANGE
        } else if folder_idx <= 0 && file_idx <= 0 {
            FIRST_RANGE
        } else {
            (per_folder * folder_idx as f64 + per_file * file_idx as f64).round() as i64
        };

        let entry = &files[file_idx as usize];
        ImageFrame {
            path: self.image_path(&folders[folder_idx as usize], entry),
            size: entry.size,
            position: Position::new(folder_idx, file_idx).to_string(),
            range,
        }
    }

    fn image_path(&self, folder: &str, entry: &Entry) -> String {
        self.root.join(folder).join(&entry.name).to_string_lossy().into_owned()
    }

    fn folders(&mut self) -> Vec<String> {
        if let Some(cached) = &self.root_folders {
            return cached.clone();
        }
        let folders = list_names(&self.root);
        self.root_folders = Some(folders.clone());
        folders
    }

    fn files(&self, folder: &str) -> Vec<Entry> {
        list_files(&self.root.join(folder))
    }
}
