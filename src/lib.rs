//! envzip Library
//!
//! Keeps a local `.env` file in sync with a shared remote store and keeps a
//! per-variable version history with rollback.
//! Tests are included in the module files and under `tests/`.
//!
//! ## Quick Start
//!
//! ```rust
//! use envzip::prelude::*;
//! ```
//!
//! This brings commonly used types and traits into scope. For more specific imports,
//! use the individual modules.

pub mod config;
pub mod constants;
pub mod controller;
pub mod error;
pub mod model;
pub mod observability;
pub mod parser;
pub mod prelude;
pub mod provider;
pub mod runtime;
pub mod store;
