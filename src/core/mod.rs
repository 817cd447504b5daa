pub mod error;
pub mod lock;
pub mod logging;
pub mod timestamp;

pub use error::{CaptureError, CaptureResult};
pub use logging::{ComponentLogger, LogContext};
pub use timestamp::{Clock, FixedClock, SystemClock};
