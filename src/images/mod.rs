pub mod events;
pub mod store;

pub use events::{EventsWatcher, spawn_watcher};
pub use store::{EventImageStore, ImageFrame, ImageRequest, Position};
