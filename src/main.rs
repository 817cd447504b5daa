// src/main.rs

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use log::{error, info, warn};

use cams_node::config::{self, Config};
use cams_node::core::{Clock, SystemClock};
use cams_node::images::{EventsWatcher, spawn_watcher};
use cams_node::motion::MotionRegistry;
use cams_node::recorder::RecordingSupervisor;
use cams_node::recorder::supervisor::spawn_supervisor;
use cams_node::web::{WebState, start_http_server};

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    // ------------------------------------------------------------
    // Config
    // ------------------------------------------------------------
    let cfg_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".into());

    let cfg: Config = config::load(&cfg_path)?;
    info!(
        "[cams] loaded {} ({} camera(s))",
        cfg_path,
        cfg.cameras.len()
    );
    let cfg = Arc::new(cfg);

    // ------------------------------------------------------------
    // Graceful shutdown
    // ------------------------------------------------------------
    let running = Arc::new(AtomicBool::new(true));
    {
        let r = running.clone();
        ctrlc::set_handler(move || {
            info!("[cams] shutdown requested");
            r.store(false, Ordering::SeqCst);
        })?;
    }

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let registry = Arc::new(MotionRegistry::new());

    // ------------------------------------------------------------
    // Workers
    // ------------------------------------------------------------
    let mut workers = Vec::new();
    workers.extend(start_supervisors(&cfg, &clock, &registry, &running));
    workers.extend(start_event_watchers(&cfg, &clock, &registry, &running));

    // ------------------------------------------------------------
    // HTTP
    // ------------------------------------------------------------
    let state = Arc::new(WebState::new(cfg.clone(), registry.clone(), clock.clone()));
    let http = start_http_server(&cfg.http.bind, state)?;

    // ------------------------------------------------------------
    // Main loop
    // ------------------------------------------------------------
    info!("[cams] running – Ctrl+C to stop");

    while running.load(Ordering::Relaxed) {
        std::thread::sleep(Duration::from_millis(100));
    }

    // ------------------------------------------------------------
    // Shutdown
    // ------------------------------------------------------------
    info!("[cams] shutting down…");
    http.shutdown();
    for worker in workers {
        let name = worker.thread().name().unwrap_or("worker").to_string();
        if worker.join().is_err() {
            error!("[cams] {} panicked", name);
        }
    }
    info!("[cams] shutdown complete");

    Ok(())
}

//
// ============================================================
// START_* HELPERS
// ============================================================
//

fn start_supervisors(
    cfg: &Config,
    clock: &Arc<dyn Clock>,
    registry: &Arc<MotionRegistry>,
    running: &Arc<AtomicBool>,
) -> Vec<JoinHandle<()>> {
    if !cfg.storage_enabled {
        info!("[cams] storage disabled, no recording");
        return Vec::new();
    }

    let recorder_cfg = cfg.recorder_config();
    let mut handles = Vec::new();

    for (key, camera) in &cfg.cameras {
        let supervisor = RecordingSupervisor::new(
            key.clone(),
            cfg.camera_root(camera),
            camera.url.clone(),
            recorder_cfg.clone(),
            clock.clone(),
            registry.clone(),
        )
        .with_command(cfg.command_for(camera))
        .with_sensitivity(camera.sensitivity);

        match spawn_supervisor(supervisor, running.clone()) {
            Ok(handle) => {
                info!("[cams] recording {} ({})", key, camera.display_name(key));
                handles.push(handle);
            }
            Err(e) => error!("[storage] fatal: {:#}", e),
        }
    }

    handles
}

fn start_event_watchers(
    cfg: &Config,
    clock: &Arc<dyn Clock>,
    registry: &Arc<MotionRegistry>,
    running: &Arc<AtomicBool>,
) -> Vec<JoinHandle<()>> {
    let mut handles = Vec::new();

    for (key, camera) in &cfg.cameras {
        let Some(root) = cfg.events_root(camera) else {
            continue;
        };
        if !root.exists() {
            warn!("[events] {}: {:?} does not exist yet", key, root);
        }

        let watcher = EventsWatcher::new(
            key.clone(),
            root,
            cfg.events_period_days,
            clock.clone(),
            registry.clone(),
        );
        match spawn_watcher(watcher, running.clone()) {
            Ok(handle) => handles.push(handle),
            Err(e) => error!("[events] fatal: {:#}", e),
        }
    }

    handles
}
