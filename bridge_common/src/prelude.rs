//! Prelude module for common re-exports.
//!
//! ```rust
//! use bridge_common::prelude::*;
//! ```

// ─── Logging ────────────────────────────────────────────────────────
pub use crate::config::LogLevel;

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{ConfigError, ConfigLoader, SharedConfig};

// ─── Errors ─────────────────────────────────────────────────────────
pub use crate::errors::{
    DUPLICATE_VALUE, Error, NOT_FOUND, ResultExt, Sentinel, report_error,
};
