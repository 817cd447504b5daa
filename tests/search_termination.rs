mod common;

use cams_node::store::MIN_FILE_SIZE;
use common::{Fixture, clock};

/// Sparse tree with gaps, undersized-only minutes and an empty day.
fn sparse_tree(fx: &Fixture) -> usize {
    let layout: Vec<(&str, Vec<(&str, Vec<u64>)>)> = vec![
        ("2024-01-05", vec![("03", vec![500, 200]), ("17", vec![5000, 5000])]),
        ("2024-01-06", vec![]),
        ("2024-01-07", vec![("00", vec![900]), ("59", vec![5000])]),
        ("2024-01-09", vec![("12", vec![5000, 100, 5000]), ("13", vec![10])]),
    ];

    let mut nodes = 1;
    for (day, minutes) in &layout {
        fx.mkdir(day);
        nodes += 1;
        for (i, (minute, sizes)) in minutes.iter().enumerate() {
            let hour = format!("{:02}", 4 + i * 7);
            nodes += 2;
            for (s, size) in sizes.iter().enumerate() {
                fx.segment(
                    &format!("{}/{}/{}/{:02}.mp4", day, hour, minute, s * 10),
                    *size as usize,
                );
            }
        }
    }
    nodes
}

#[test]
fn test_search_terminates_everywhere() {
    let fx = Fixture::new();
    let nodes = sparse_tree(&fx);
    let clock = clock("20240109235900");

    let parents = [
        "",
        "2024-01-04",
        "2024-01-05",
        "2024-01-05/04",
        "2024-01-06",
        "2024-01-06/10",
        "2024-01-07/11",
        "2024-01-08",
        "2024-01-09/04",
        "2024-01-09/11",
        "2024-01-10/00",
    ];
    let targets = [None, Some("00"), Some("03"), Some("30"), Some("99")];

    for parent in parents {
        for target in targets {
            for step in [-1, 1] {
                let mut store = fx.store(&clock);
                let outcome = store.search(parent, target, step);
                assert!(
                    outcome.steps <= 6 * nodes + 10,
                    "{}/{:?} step {} took {} steps",
                    parent,
                    target,
                    step,
                    outcome.steps
                );
                if outcome.segment.is_found() {
                    assert!(outcome.segment.size > MIN_FILE_SIZE);
                }
            }
        }
    }
}

#[test]
fn test_search_skips_undersized_minutes() {
    let fx = Fixture::new();
    sparse_tree(&fx);
    let clock = clock("20240109235900");

    // 2024-01-05/04/03 only holds broken files; forward lands in hour 11.
    let mut store = fx.store(&clock);
    let segment = store.nearest_file("2024-01-05", Some("00"), 1);
    assert_eq!(segment.path, fx.path("2024-01-05/11/17/00.mp4"));

    // Backward from the empty day reaches the last valid file before it.
    let mut store = fx.store(&clock);
    let segment = store.nearest_file("2024-01-07/00", Some("00"), -1);
    assert_eq!(segment.path, fx.path("2024-01-05/11/17/10.mp4"));
}

#[test]
fn test_search_backward_wraps_to_beginning() {
    let fx = Fixture::new();
    sparse_tree(&fx);
    let clock = clock("20240109235900");

    let mut store = fx.store(&clock);
    let segment = store.nearest_file("2024-01-01/00", Some("00"), -1);
    assert_eq!(segment.path, fx.path("2024-01-05/11/17/00.mp4"));
}
