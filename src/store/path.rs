use std::path::Path;

use crate::core::timestamp::is_web_datetime;

/// Depth of the `day/hour/minute` folder tree below a camera root.
pub const DEPTH: usize = 3;
pub const SEGMENT_EXT: &str = "mp4";

/// Recovers the canonical 14 digit timestamp from a segment path by
/// dropping the camera root, the extension and every non-digit.
pub fn datetime_from_path(root: &Path, path: &str) -> String {
    let root = root.to_string_lossy();
    let relative = path
        .strip_prefix(root.as_ref())
        .map(|rest| rest.trim_start_matches('/'))
        .unwrap_or(path);

    let without_ext = match relative.rfind('.') {
        Some(dot) if !relative[dot..].contains('/') => &relative[..dot],
        _ => relative,
    };

    without_ext.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// `YYYYMMDDHHMMSS` to the relative segment path `YYYY-MM-DD/HH/MM/SS.mp4`.
pub fn path_from_datetime(datetime: &str) -> Option<String> {
    if !is_web_datetime(datetime) {
        return None;
    }
    let d = datetime;
    Some(format!(
        "{}-{}-{}/{}/{}/{}.{}",
        &d[0..4],
        &d[4..6],
        &d[6..8],
        &d[8..10],
        &d[10..12],
        &d[12..14],
        SEGMENT_EXT
    ))
}

/// Splits `a/b/c` into (`a/b`, `c`).
pub fn split_last(path: &str) -> (&str, &str) {
    match path.rfind('/') {
        Some(i) => (&path[..i], &path[i + 1..]),
        None => ("", path),
    }
}

pub fn join(parent: &str, child: &str) -> String {
    if parent.is_empty() {
        child.to_string()
    } else {
        format!("{}/{}", parent, child)
    }
}
