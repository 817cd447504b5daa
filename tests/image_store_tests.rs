mod common;

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use cams_node::core::timestamp::web_datetime;
use cams_node::images::store::FIRST_RANGE;
use cams_node::images::{EventImageStore, EventsWatcher, ImageRequest, Position};
use cams_node::motion::MotionRegistry;
use cams_node::store::LIVE_RANGE;
use chrono::{DateTime, Local};
use common::{clock, write_file};

fn events_tree(root: &Path) {
    for name in ["a.jpg", "b.jpg", "c.jpg"] {
        write_file(root, &format!("2024-01-08/{}", name), 3000);
    }
    for name in ["a.jpg", "b.jpg"] {
        write_file(root, &format!("2024-01-09/{}", name), 3000);
    }
    for name in ["a.jpg", "b.jpg"] {
        write_file(root, &format!("live/{}", name), 3000);
    }
}

#[test]
fn test_image_edges() {
    let dir = tempfile::tempdir().unwrap();
    events_tree(dir.path());
    let mut store = EventImageStore::new("front", dir.path());

    let last = store.last();
    assert_eq!(last.position, "2.1");
    assert_eq!(last.range, LIVE_RANGE);
    assert!(last.path.ends_with("live/b.jpg"));

    let first = store.first();
    assert_eq!(first.position, "0.0");
    assert_eq!(first.range, FIRST_RANGE);
    assert!(first.path.ends_with("2024-01-08/a.jpg"));

    assert_eq!(store.chart_data(), vec![3, 2, 2]);
}

#[test]
fn test_image_next_paging() {
    let dir = tempfile::tempdir().unwrap();
    events_tree(dir.path());
    let mut store = EventImageStore::new("front", dir.path());

    let frame = store.next(-1, Position::new(2, 1));
    assert_eq!((frame.position.as_str(), frame.range), ("2.0", 1333));

    // Off the start of a folder: previous folder's last image.
    let frame = store.next(-1, Position::new(2, 0));
    assert_eq!((frame.position.as_str(), frame.range), ("1.1", 1000));
    assert!(frame.path.ends_with("2024-01-09/b.jpg"));

    // Off the end of a folder: next folder's first image.
    let frame = store.next(1, Position::new(0, 2));
    assert_eq!((frame.position.as_str(), frame.range), ("1.0", 667));

    assert_eq!(store.next(1, Position::new(2, 1)).range, LIVE_RANGE);
    assert_eq!(store.next(-1, Position::new(0, 0)).range, FIRST_RANGE);
    assert_eq!(store.next(0, Position::new(0, 0)).position, "2.1");

    // Without a position paging starts from the newest image.
    let frame = store.get(&ImageRequest::Next {
        step: -1,
        pos: None,
    });
    assert_eq!(frame.position, "2.0");
}

#[test]
fn test_image_by_range() {
    let dir = tempfile::tempdir().unwrap();
    events_tree(dir.path());
    let mut store = EventImageStore::new("front", dir.path());

    let frame = store.by_range(0, None);
    assert_eq!((frame.position.as_str(), frame.range), ("0.0", FIRST_RANGE));

    let frame = store.by_range(1000, None);
    assert_eq!((frame.position.as_str(), frame.range), ("1.1", 1000));

    // Same position as the client already shows.
    assert!(!store.by_range(1000, Some(Position::new(1, 1))).is_found());

    let frame = store.by_range(5000, None);
    assert_eq!((frame.position.as_str(), frame.range), ("2.1", LIVE_RANGE));
}

fn touch(path: &Path, at: SystemTime) -> anyhow::Result<()> {
    fs::File::options().write(true).open(path)?.set_modified(at)?;
    Ok(())
}

#[test]
fn test_events_rotation_and_cleanup() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let root = dir.path().join("front");
    write_file(&root, "2024-01-01/old.jpg", 3000);
    write_file(&root, "live/a.jpg", 3000);
    write_file(&root, "live/b.jpg", 3000);

    let clock = clock("20240110000500");
    let registry = Arc::new(MotionRegistry::new());
    let mut watcher = EventsWatcher::new("front", &root, 3, clock.clone(), registry);

    let now = chrono::NaiveDate::from_ymd_opt(2024, 1, 10)
        .unwrap()
        .and_hms_opt(0, 5, 0)
        .unwrap();
    assert!(watcher.rotate(now)?);
    assert!(!root.join("2024-01-01").exists());
    assert!(root.join("2024-01-09/a.jpg").exists());
    assert!(root.join("2024-01-09/b.jpg").exists());
    assert!(fs::read_dir(root.join("live"))?.next().is_none());

    // Once per day.
    write_file(&root, "live/c.jpg", 3000);
    assert!(!watcher.rotate(now)?);
    assert!(root.join("live/c.jpg").exists());
    Ok(())
}

#[test]
fn test_events_motion_marks() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let root = dir.path().join("front");
    let base = SystemTime::now() - Duration::from_secs(600);

    let first = write_file(&root, "live/a.jpg", 3000);
    touch(&first, base)?;

    let clock = clock("20240110120000");
    let registry = Arc::new(MotionRegistry::new());
    let mut watcher = EventsWatcher::new("front", &root, 30, clock.clone(), registry.clone());

    // First observation only seeds.
    assert_eq!(watcher.check()?, None);
    let seeded = web_datetime(DateTime::<Local>::from(base).naive_local());
    assert_eq!(registry.get("front"), Some(seeded));

    assert_eq!(watcher.check()?, None);

    let second = write_file(&root, "live/b.jpg", 3000);
    let later = base + Duration::from_secs(120);
    touch(&second, later)?;

    let mark = web_datetime(DateTime::<Local>::from(later).naive_local());
    assert_eq!(watcher.check()?, Some(mark.clone()));
    assert_eq!(registry.get("front"), Some(mark));
    Ok(())
}
