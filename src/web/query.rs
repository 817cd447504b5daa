// src/web/query.rs
use std::collections::BTreeMap;

use crate::images::{ImageRequest, Position};
use crate::store::{MAX_RANGE, SegmentRequest};

/// Path plus decoded query parameters of a request url. Repeated keys keep
/// their first value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    pub path: String,
    params: BTreeMap<String, String>,
}

impl Query {
    pub fn parse(url: &str) -> Self {
        let (path, raw) = url.split_once('?').unwrap_or((url, ""));
        let mut params = BTreeMap::new();

        for part in raw.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = part.split_once('=').unwrap_or((part, ""));
            let key = decode(key);
            if key.is_empty() {
                continue;
            }
            params.entry(key).or_insert_with(|| decode(value));
        }

        Self {
            path: path.to_string(),
            params,
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn has(&self, key: &str) -> bool {
        self.params.contains_key(key)
    }

    pub fn int(&self, key: &str) -> Option<i64> {
        self.get(key)?.trim().parse().ok()
    }
}

fn decode(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => spaced,
    }
}

/// `video=live|range|next` onto a store request. `None` for unknown modes.
pub fn video_request(query: &Query) -> Option<SegmentRequest> {
    let datetime = query.get("dt").unwrap_or_default().to_string();

    match query.get("video")? {
        "live" => Some(SegmentRequest::Live {
            after: Some(datetime).filter(|dt| !dt.is_empty()),
        }),
        "range" => Some(SegmentRequest::Range(
            query.int("range").unwrap_or(MAX_RANGE),
        )),
        "next" => Some(SegmentRequest::Next {
            step: query.int("step").unwrap_or(0),
            datetime,
            sensitivity: query
                .int("md")
                .and_then(|md| i32::try_from(md).ok())
                .filter(|md| *md >= 0),
        }),
        _ => None,
    }
}

/// `image=next|range` onto an image request.
pub fn image_request(query: &Query) -> Option<ImageRequest> {
    let pos = query.get("pos").and_then(Position::parse);

    match query.get("image")? {
        "next" => Some(ImageRequest::Next {
            step: query.int("step").unwrap_or(0),
            pos,
        }),
        "range" => Some(ImageRequest::Range {
            rng: query.int("range").unwrap_or(MAX_RANGE),
            pos,
        }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_query() {
        let q = Query::parse("/?video=next&hash=front&dt=20240110120000&step=-2&x=a%20b&x=c");
        assert_eq!(q.path, "/");
        assert_eq!(q.get("hash"), Some("front"));
        assert_eq!(q.int("step"), Some(-2));
        assert_eq!(q.get("x"), Some("a b"));
        assert!(!q.has("missing"));

        let q = Query::parse("/health");
        assert_eq!(q.path, "/health");
        assert!(q.get("video").is_none());

        let q = Query::parse("/?bell");
        assert!(q.has("bell"));
    }

    #[test]
    fn test_video_request() {
        let q = Query::parse("/?video=next&step=2&dt=20240110120000&md=50");
        assert_eq!(
            video_request(&q),
            Some(SegmentRequest::Next {
                step: 2,
                datetime: "20240110120000".to_string(),
                sensitivity: Some(50),
            })
        );

        let q = Query::parse("/?video=next&step=1&dt=20240110120000&md=-1");
        assert!(matches!(
            video_request(&q),
            Some(SegmentRequest::Next {
                sensitivity: None,
                ..
            })
        ));

        let q = Query::parse("/?video=range");
        assert_eq!(video_request(&q), Some(SegmentRequest::Range(MAX_RANGE)));

        let q = Query::parse("/?video=live&dt=");
        assert_eq!(video_request(&q), Some(SegmentRequest::Live { after: None }));

        let q = Query::parse("/?video=bogus");
        assert_eq!(video_request(&q), None);
    }

    #[test]
    fn test_image_request() {
        let q = Query::parse("/?image=range&range=700&pos=1.3");
        assert_eq!(
            image_request(&q),
            Some(ImageRequest::Range {
                rng: 700,
                pos: Some(Position::new(1, 3)),
            })
        );

        let q = Query::parse("/?image=next");
        assert_eq!(
            image_request(&q),
            Some(ImageRequest::Next { step: 0, pos: None })
        );
    }
}
