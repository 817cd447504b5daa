use std::collections::VecDeque;

/// Number of recent segment sizes the playback detector averages over.
pub const MOTION_WINDOW: usize = 10;

/// Fixed capacity ring of recent segment sizes.
#[derive(Debug, Clone)]
pub struct SizeWindow {
    sizes: VecDeque<u64>,
    capacity: usize,
}

impl SizeWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            sizes: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, size: u64) {
        if self.sizes.len() >= self.capacity {
            self.sizes.pop_front();
        }
        self.sizes.push_back(size);
    }

    /// Mean of the current contents, `None` while empty.
    pub fn mean(&self) -> Option<f64> {
        if self.sizes.is_empty() {
            return None;
        }
        let total: u64 = self.sizes.iter().sum();
        Some(total as f64 / self.sizes.len() as f64)
    }

    pub fn len(&self) -> usize {
        self.sizes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sizes.is_empty()
    }
}

impl Default for SizeWindow {
    fn default() -> Self {
        Self::new(MOTION_WINDOW)
    }
}

/// Playback threshold: user sensitivity 0..100 is inverted so that a higher
/// sensitivity means a lower size jump.
pub fn effective_sensitivity(sensitivity: i32) -> u32 {
    (100 - sensitivity.clamp(0, 90)) as u32
}

/// Playback hit test against the window mean.
pub fn exceeds_average(size: u64, average: f64, effective: u32) -> bool {
    average > 0.0 && size as f64 > average * (1.0 + effective as f64 / 100.0)
}

/// Live hit test: the camera's configured multiplier is applied as is.
pub fn exceeds_multiplier(size: u64, average: f64, multiplier: f64) -> bool {
    average > 0.0 && size as f64 > average * multiplier
}
