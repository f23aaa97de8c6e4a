//! # Runtime
//!
//! Long-running watch mode: file watching and the loop that turns file and
//! remote change events into sync passes.

pub mod watch_loop;
pub mod watcher;

pub use watch_loop::{start_watching, WatchHandle, WatchOptions, WatchUpdate};
pub use watcher::FileWatcher;
