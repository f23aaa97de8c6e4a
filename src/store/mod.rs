//! # Stores
//!
//! File-backed state on the local side: the env file and the sync baseline.

mod baseline;
mod local;

pub use baseline::{Baseline, BaselineStore};
pub use local::{LocalStore, LocalWriteSet};
pub(crate) use local::write_atomic;
