mod common;

use cams_node::core::timestamp::parse_web_datetime;
use cams_node::recorder::{FsRetention, RetentionPolicy};
use common::Fixture;

#[test]
fn test_retention_keeps_horizon() -> anyhow::Result<()> {
    let fx = Fixture::new();
    for day in 1..=10 {
        fx.segment(&format!("2024-01-{:02}/08/00/00.mp4", day), 5000);
    }
    fx.mkdir("lost+found");

    let now = parse_web_datetime("20240110120000").unwrap();
    let report = FsRetention::new(fx.root.clone(), 3).run(now)?;

    let expected: Vec<String> = (1..=6).map(|d| format!("2024-01-{:02}", d)).collect();
    assert_eq!(report.removed_days, expected);
    for day in 1..=6 {
        assert!(!fx.exists(&format!("2024-01-{:02}", day)));
    }
    for day in 7..=10 {
        assert!(fx.exists(&format!("2024-01-{:02}/08/00/00.mp4", day)));
    }
    assert!(fx.exists("lost+found"));
    Ok(())
}

#[test]
fn test_retention_sweeps_undersized_leftovers() -> anyhow::Result<()> {
    let fx = Fixture::new();
    fx.segment("2024-01-08/05/00/00.mp4", 5000);
    fx.segment("2024-01-08/06/30/00.mp4", 120);
    fx.mkdir("2024-01-09/05/05");
    fx.segment("2024-01-10/11/00/00.mp4", 5000);
    fx.segment("2024-01-10/11/00/10.mp4", 999);
    // Still being written.
    fx.segment("2024-01-10/12/00/20.mp4", 10);
    fx.mkdir("2024-01-10/12/01");

    let now = parse_web_datetime("20240110120025").unwrap();
    let report = FsRetention::new(fx.root.clone(), 3)
        .with_undersized_sweep(1000)
        .run(now)?;

    assert!(report.removed_days.is_empty());
    assert_eq!(report.removed_files, 2);

    assert!(fx.exists("2024-01-08/05/00/00.mp4"));
    assert!(!fx.exists("2024-01-08/06"));
    assert!(!fx.exists("2024-01-09/05"));
    assert!(fx.exists("2024-01-09"));
    assert!(fx.exists("2024-01-10/11/00/00.mp4"));
    assert!(!fx.exists("2024-01-10/11/00/10.mp4"));
    assert!(fx.exists("2024-01-10/12/00/20.mp4"));
    assert!(fx.exists("2024-01-10/12/01"));
    Ok(())
}

#[test]
fn test_retention_missing_root_is_noop() -> anyhow::Result<()> {
    let fx = Fixture::new();
    let now = parse_web_datetime("20240110120000").unwrap();

    let report = FsRetention::new(fx.root.join("nope"), 3)
        .with_undersized_sweep(1000)
        .run(now)?;
    assert_eq!(report, Default::default());
    Ok(())
}
