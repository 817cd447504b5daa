use std::collections::HashMap;
use std::sync::Mutex;

use crate::core::lock::lock_mutex;

/// Last detected motion per camera, as a 14 digit timestamp.
///
/// Written by the supervisors (and events watchers), read by navigation
/// and the bell endpoint. Marks never move backwards.
#[derive(Default)]
pub struct MotionRegistry {
    marks: Mutex<HashMap<String, String>>,
}

impl MotionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `mark` for `camera` if it is strictly newer than the current
    /// one. Returns whether the registry changed.
    pub fn record(&self, camera: &str, mark: &str) -> bool {
        let mut marks = lock_mutex(&self.marks, "motion.registry.record");
        match marks.get(camera) {
            Some(current) if current.as_str() >= mark => false,
            _ => {
                marks.insert(camera.to_string(), mark.to_string());
                true
            }
        }
    }

    pub fn get(&self, camera: &str) -> Option<String> {
        lock_mutex(&self.marks, "motion.registry.get")
            .get(camera)
            .cloned()
    }

    pub fn snapshot(&self) -> HashMap<String, String> {
        lock_mutex(&self.marks, "motion.registry.snapshot").clone()
    }

    /// Marks strictly newer than `since`, sorted by camera key.
    pub fn newer_than(&self, since: &str) -> Vec<(String, String)> {
        let marks = lock_mutex(&self.marks, "motion.registry.newer_than");
        let mut out: Vec<_> = marks
            .iter()
            .filter(|(_, mark)| mark.as_str() > since)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        out.sort();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_record_is_monotonic() {
        let registry = MotionRegistry::new();
        assert!(registry.record("front", "20240110120010"));
        assert!(!registry.record("front", "20240110120000"));
        assert!(!registry.record("front", "20240110120010"));
        assert!(registry.record("front", "20240110120020"));
        assert_eq!(registry.get("front").as_deref(), Some("20240110120020"));
        assert!(registry.get("back").is_none());
    }

    #[test]
    fn test_newer_than_filters_and_sorts() {
        let registry = MotionRegistry::new();
        registry.record("yard", "20240110120000");
        registry.record("door", "20240110130000");
        registry.record("attic", "20240109000000");

        let newer = registry.newer_than("20240110000000");
        assert_eq!(
            newer,
            vec![
                ("door".to_string(), "20240110130000".to_string()),
                ("yard".to_string(), "20240110120000".to_string()),
            ]
        );
        assert_eq!(registry.snapshot().len(), 3);
    }

    #[test]
    fn test_concurrent_writers_keep_newest() {
        let registry = Arc::new(MotionRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    for s in 0..50 {
                        let mark = format!("2024011012{:02}{:02}", i, s % 60);
                        registry.record("cam", &mark);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(registry.get("cam").as_deref(), Some("20240110120749"));
    }
}
