//! # Configuration
//!
//! - `sync`: the `envzip.config` file binding an env file to a project/stage
//! - `runtime`: process settings from environment variables

mod runtime;
mod sync;

pub use runtime::{LogFormat, RuntimeConfig};
pub use sync::{is_valid_key, SyncConfig};
