use std::io;

use thiserror::Error;

pub type CaptureResult<T> = Result<T, CaptureError>;

/// Failures around launching and stopping the external capture process.
///
/// None of these are fatal: the supervisor logs them and the next watchdog
/// tick retries.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("camera url '{url}' has no usable network address")]
    InvalidUrl { url: String },
    #[error("camera address '{address}' cannot be resolved")]
    Unresolvable { address: String },
    #[error("capture command is empty")]
    EmptyCommand,
    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to kill capture process {pid}: {source}")]
    Kill {
        pid: u32,
        #[source]
        source: io::Error,
    },
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
}

impl CaptureError {
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}
