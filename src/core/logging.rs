// src/core/logging.rs
use std::sync::atomic::{AtomicU64, Ordering};

// Global sequence number so interleaved camera threads can be told apart.
static LOG_SEQUENCE: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone)]
pub struct LogContext {
    pub component: String,
    pub camera: String,
    pub scope: Option<String>,
    pub sequence: u64,
}

impl LogContext {
    pub fn new(component: &str, camera: &str) -> Self {
        Self {
            component: component.to_string(),
            camera: camera.to_string(),
            scope: None,
            sequence: LOG_SEQUENCE.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// Narrows the context, e.g. to `watchdog` or `retention`.
    pub fn with_scope(mut self, scope: &str) -> Self {
        self.scope = Some(scope.to_string());
        self
    }

    pub fn format(&self, message: &str) -> String {
        let scope = match &self.scope {
            Some(scope) => format!(":{}", scope),
            None => String::new(),
        };

        format!(
            "[{}{}][{}][seq={:06}] {}",
            self.component, scope, self.camera, self.sequence, message
        )
    }
}

pub trait ComponentLogger {
    fn log_context(&self) -> LogContext;

    fn debug(&self, message: &str) {
        log::debug!("{}", self.log_context().format(message));
    }

    fn info(&self, message: &str) {
        log::info!("{}", self.log_context().format(message));
    }

    fn warn(&self, message: &str) {
        log::warn!("{}", self.log_context().format(message));
    }

    fn error(&self, message: &str) {
        log::error!("{}", self.log_context().format(message));
    }
}
