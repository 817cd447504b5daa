// src/web/server.rs

use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::Context;
use log::{debug, error, info, warn};
use serde::Serialize;
use tiny_http::{Header, Method, Request, Response, Server, StatusCode};

use crate::config::{CameraConfig, Config};
use crate::core::Clock;
use crate::images::EventImageStore;
use crate::motion::MotionRegistry;
use crate::store::SegmentStore;

use super::query::{Query, image_request, video_request};

pub const BELL_POLLS: u32 = 30;
pub const BELL_INTERVAL: Duration = Duration::from_secs(1);

/// Everything a request handler needs; shared by all request threads.
pub struct WebState {
    pub config: Arc<Config>,
    pub registry: Arc<MotionRegistry>,
    pub clock: Arc<dyn Clock>,
    pub bell_polls: u32,
    pub bell_interval: Duration,
}

impl WebState {
    pub fn new(config: Arc<Config>, registry: Arc<MotionRegistry>, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            registry,
            clock,
            bell_polls: BELL_POLLS,
            bell_interval: BELL_INTERVAL,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    Empty,
    Text(String),
    File(PathBuf),
}

/// Transport independent answer of the router.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub status: u16,
    pub headers: Vec<(&'static str, String)>,
    pub body: Body,
}

impl Reply {
    pub fn empty(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Body::Empty,
        }
    }

    pub fn text(status: u16, text: impl Into<String>) -> Self {
        Self {
            status,
            headers: vec![("Content-Type", "text/plain; charset=utf-8".to_string())],
            body: Body::Text(text.into()),
        }
    }

    pub fn json<T: Serialize>(value: &T) -> Self {
        match serde_json::to_string(value) {
            Ok(json) => Self {
                status: 200,
                headers: vec![("Content-Type", "application/json".to_string())],
                body: Body::Text(json),
            },
            Err(err) => Self::text(500, err.to_string()),
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    fn with_header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BellEntry {
    pub dt: String,
    pub name: String,
}

// ============================================================================
// Server
// ============================================================================

pub struct HttpServer {
    server: Arc<Server>,
    handle: Option<thread::JoinHandle<()>>,
}

impl HttpServer {
    /// Stops accepting requests; in-flight requests finish on their own
    /// threads.
    pub fn shutdown(mut self) {
        self.server.unblock();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

pub fn start_http_server(bind: &str, state: Arc<WebState>) -> anyhow::Result<HttpServer> {
    let server = Arc::new(Server::http(bind).map_err(|e| anyhow::anyhow!(e))?);
    info!("[web] HTTP server on {}", bind);

    let accept = server.clone();
    let handle = thread::Builder::new()
        .name("http".to_string())
        .spawn(move || {
            for req in accept.incoming_requests() {
                let state = state.clone();
                let spawned = thread::Builder::new()
                    .name("http-request".to_string())
                    .spawn(move || handle_request(req, &state));
                if let Err(e) = spawned {
                    error!("[web] request thread: {}", e);
                }
            }
            debug!("[web] accept loop finished");
        })
        .context("spawning http thread")?;

    Ok(HttpServer {
        server,
        handle: Some(handle),
    })
}

fn handle_request(req: Request, state: &WebState) {
    if req.method() != &Method::Get {
        respond(req, Reply::text(405, "method not allowed"));
        return;
    }

    let url = req.url().to_string();
    debug!("[web] GET {}", url);
    let reply = route(state, &url);
    respond(req, reply);
}

fn respond(req: Request, reply: Reply) {
    let headers: Vec<Header> = reply
        .headers
        .iter()
        .filter_map(|(name, value)| Header::from_bytes(name.as_bytes(), value.as_bytes()).ok())
        .collect();
    let status = StatusCode(reply.status);

    let result = match reply.body {
        Body::Empty => {
            let mut response = Response::empty(status);
            for header in headers {
                response.add_header(header);
            }
            req.respond(response)
        }
        Body::Text(text) => {
            let mut response = Response::from_string(text).with_status_code(status);
            for header in headers {
                response.add_header(header);
            }
            req.respond(response)
        }
        Body::File(path) => match File::open(&path) {
            Ok(file) => {
                let mut response = Response::from_file(file).with_status_code(status);
                for header in headers {
                    response.add_header(header);
                }
                req.respond(response)
            }
            Err(e) => {
                // Removed by retention between lookup and read.
                warn!("[web] open {:?}: {}", path, e);
                req.respond(Response::empty(StatusCode(204)))
            }
        },
    };

    if let Err(e) = result {
        debug!("[web] client went away: {}", e);
    }
}

// ============================================================================
// Router
// ============================================================================

pub fn route(state: &WebState, url: &str) -> Reply {
    let query = Query::parse(url);

    if query.path == "/health" {
        return Reply::text(200, "ok");
    }
    if query.path != "/" {
        return Reply::empty(404);
    }

    if query.has("bell") {
        return bell(state, &query);
    }

    let Some(key) = query.get("hash") else {
        return Reply::text(400, "missing hash");
    };
    let Some(camera) = state.config.camera(key) else {
        return Reply::text(404, "unknown camera");
    };

    if query.has("video") {
        return video(state, &query, key, camera);
    }
    if query.has("image") {
        return image(state, &query, key, camera);
    }

    Reply::text(404, "invalid route")
}

fn video(state: &WebState, query: &Query, key: &str, camera: &CameraConfig) -> Reply {
    let mut store = SegmentStore::new(
        key,
        state.config.camera_root(camera),
        state.config.store_config(),
        state.clock.clone(),
    );

    let segment = if query.get("video") == Some("motion") {
        store.last_motion(&state.registry)
    } else {
        match video_request(query) {
            Some(request) => store.get(&request),
            None => return Reply::text(400, "invalid video mode"),
        }
    };

    if !segment.is_found() {
        return Reply::empty(204);
    }
    let datetime = store.datetime_from_path(&segment.path);
    if query.get("dt") == Some(datetime.as_str()) {
        return Reply::empty(204);
    }

    let mut reply = Reply::empty(200)
        .with_header("Content-Type", "video/mp4")
        .with_header("Cache-Control", "no-store")
        .with_header("X-Datetime", datetime);
    if let Some(range) = store.range_from_path(&segment.path) {
        reply = reply.with_header("X-Range", range.to_string());
    }
    reply.body = Body::File(PathBuf::from(segment.path));
    reply
}

fn image(state: &WebState, query: &Query, key: &str, camera: &CameraConfig) -> Reply {
    let Some(root) = state.config.events_root(camera) else {
        return Reply::text(404, "events disabled");
    };
    let mut store = EventImageStore::new(key, root);

    if query.get("image") == Some("chart") {
        return Reply::json(&store.chart_data());
    }

    let Some(request) = image_request(query) else {
        return Reply::text(400, "invalid image mode");
    };
    let frame = store.get(&request);
    if !frame.is_found() {
        return Reply::empty(204);
    }

    let mut reply = Reply::empty(200)
        .with_header("Content-Type", image_mime(Path::new(&frame.path)))
        .with_header("Cache-Control", "no-store")
        .with_header("X-Range", frame.range.to_string())
        .with_header("X-Position", frame.position);
    reply.body = Body::File(PathBuf::from(frame.path));
    reply
}

/// Long poll for motion marks newer than `dt` that appeared while polling.
fn bell(state: &WebState, query: &Query) -> Reply {
    let since = query.get("dt").unwrap_or_default();
    let before = state.registry.snapshot();
    let polls = state.bell_polls.max(1);

    let mut hits: BTreeMap<String, BellEntry> = BTreeMap::new();
    for attempt in 1..=polls {
        thread::sleep(state.bell_interval);

        hits = state
            .registry
            .newer_than(since)
            .into_iter()
            .filter(|(key, mark)| before.get(key).is_none_or(|prev| mark > prev))
            .filter_map(|(key, mark)| {
                let camera = state.config.camera(&key)?;
                let name = camera.display_name(&key).to_string();
                Some((key, BellEntry { dt: mark, name }))
            })
            .collect();

        if !hits.is_empty() || attempt == polls {
            break;
        }
    }

    Reply::json(&hits)
}

fn image_mime(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}
