// src/recorder/capture.rs
use std::io;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::thread::sleep;
use std::time::{Duration, Instant};

use chrono::NaiveDateTime;
use log::{debug, warn};

use crate::core::{CaptureError, CaptureResult};

const REAP_POLL: Duration = Duration::from_millis(50);

/// Splits the template on whitespace, then substitutes `{url}` and
/// `{cam_path}` in every argument. Substituted values are never re-split.
pub fn build_command(template: &str, url: &str, cam_path: &Path) -> CaptureResult<Vec<String>> {
    let cam_path = cam_path.to_string_lossy();
    let argv: Vec<String> = template
        .split_whitespace()
        .map(|arg| arg.replace("{url}", url).replace("{cam_path}", &cam_path))
        .collect();

    if argv.is_empty() {
        return Err(CaptureError::EmptyCommand);
    }
    Ok(argv)
}

/// The external recorder writing segments for one camera.
///
/// Owned by the supervisor; dropping it kills and reaps the child.
pub struct CaptureProcess {
    child: Child,
    pid: u32,
    started_at: NaiveDateTime,
    stopped: bool,
}

impl CaptureProcess {
    pub fn spawn(argv: &[String], started_at: NaiveDateTime) -> CaptureResult<Self> {
        let (program, args) = argv.split_first().ok_or(CaptureError::EmptyCommand)?;

        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| CaptureError::Spawn {
                program: program.clone(),
                source,
            })?;

        let pid = child.id();
        debug!("[capture] spawned {} (pid {})", program, pid);

        Ok(Self {
            child,
            pid,
            started_at,
            stopped: false,
        })
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn started_at(&self) -> NaiveDateTime {
        self.started_at
    }

    /// True once the child is gone (reaps it as a side effect).
    pub fn has_exited(&mut self) -> bool {
        if self.stopped {
            return true;
        }
        match self.child.try_wait() {
            Ok(Some(status)) => {
                debug!("[capture] pid {} exited: {}", self.pid, status);
                true
            }
            Ok(None) => false,
            Err(err) => {
                warn!("[capture] pid {} wait failed: {}", self.pid, err);
                true
            }
        }
    }

    /// Kills the child and waits up to `grace` for it to be reaped. Past the
    /// grace period it blocks on a final `wait` so no zombie is left behind.
    pub fn stop(&mut self, grace: Duration) -> CaptureResult<()> {
        if self.stopped {
            return Ok(());
        }
        self.stopped = true;

        let killed = match self.child.kill() {
            Ok(()) => Ok(()),
            // Already exited and reaped.
            Err(err) if err.kind() == io::ErrorKind::InvalidInput => Ok(()),
            Err(source) => Err(CaptureError::Kill {
                pid: self.pid,
                source,
            }),
        };

        let deadline = Instant::now() + grace;
        loop {
            match self.child.try_wait() {
                Ok(Some(_)) => break,
                Ok(None) if Instant::now() < deadline => sleep(REAP_POLL),
                Ok(None) => {
                    warn!(
                        "[capture] pid {} still running after {:?}, waiting",
                        self.pid, grace
                    );
                    self.child
                        .wait()
                        .map_err(|e| CaptureError::io(format!("reap pid {}", self.pid), e))?;
                    break;
                }
                Err(e) => return Err(CaptureError::io(format!("reap pid {}", self.pid), e)),
            }
        }

        killed
    }
}

impl Drop for CaptureProcess {
    fn drop(&mut self) {
        if let Err(err) = self.stop(super::KILL_GRACE) {
            warn!("[capture] {}", err);
        }
    }
}
