//! Bridge Common Library
//!
//! Shared building blocks for the servo bridge workspace: a structured error
//! type that captures the call stack once and accumulates a chain of wrap
//! annotations, plus TOML configuration loading.
//!
//! # Module Structure
//!
//! - [`errors`] - Stack-carrying `Error`, sentinels, metadata, stack marshalling
//! - [`config`] - Configuration loading traits and types
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```rust
//! use bridge_common::errors::{self, Error, NOT_FOUND};
//!
//! let err = Error::new(&NOT_FOUND);
//! let err = Error::wrap(err, "looking up label");
//! assert!(errors::is(&err, &NOT_FOUND));
//! assert_eq!(err.chain_message(), "not found -- looking up label");
//! ```

pub mod config;
pub mod errors;
pub mod prelude;
