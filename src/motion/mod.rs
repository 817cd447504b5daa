pub mod registry;
pub mod window;

pub use registry::MotionRegistry;
pub use window::{MOTION_WINDOW, SizeWindow};
