// src/lib.rs
pub mod config;
pub mod core;
pub mod images;
pub mod motion;
pub mod recorder;
pub mod store;
pub mod web;

// Re-exports
pub use core::{Clock, ComponentLogger, LogContext, SystemClock};
pub use motion::MotionRegistry;
pub use recorder::RecordingSupervisor;
pub use store::{Segment, SegmentRequest, SegmentStore};
