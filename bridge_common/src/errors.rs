//! Structured errors with a one-time stack capture.
//!
//! An [`Error`] wraps any failure cause, records the call stack the first
//! time a plain cause is wrapped, and accumulates a `" -- "`-separated chain
//! of annotations as it travels up through the layers. At the reporting
//! boundary the chain is logged together with the resolved frames
//! ([`marshal_stack`], [`report_error`]).
//!
//! ## Flow
//!
//! ```text
//! io::Error ──Error::wrap──► Error{stack captured} ──wrap──► same Error, chain grows
//!                                                              │
//!                                              report_error ◄──┘ (chain + frames)
//! ```
//!
//! [`is`] and [`find`] walk the `source()` chain, so sentinel identity
//! ([`NOT_FOUND`], [`DUPLICATE_VALUE`]) survives any number of wraps.

mod error;
mod frame;
mod marshal;
mod metadata;
mod report;
mod sentinel;

pub use error::{Error, ResultExt, WrapInput, chain, find, is, wrap};
pub use frame::{CaptureToken, StackFrame, working_dir};
pub use marshal::{StackSource, marshal_stack};
pub use metadata::{HttpMetadata, Metadata, status_text};
pub use report::report_error;
pub use sentinel::{DUPLICATE_VALUE, NOT_FOUND, Sentinel};

/// Maximum number of stack frames captured for any error.
pub const MAX_STACK_DEPTH: usize = 50;

/// Separator between annotations in an error's chain message.
pub const CHAIN_SEPARATOR: &str = " -- ";
