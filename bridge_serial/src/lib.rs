//! # Servo Bridge Library
//!
//! Listens for object-detection labels on Redis and drives a servo
//! controller over a serial port.
//!
//! # Module Structure
//!
//! - [`config`] - `BridgeConfig` loaded from TOML
//! - [`mapping`] - label → category → servo values lookup
//! - [`pubsub`] - Redis connection retry loop and channel subscriber
//! - [`serial`] - serial port setup
//! - [`bridge`] - the polling loop tying it together
//!
//! # Architecture
//!
//! ```text
//! ┌────────────┐  label   ┌──────────────┐  servo values  ┌─────────────┐
//! │   Redis    │─────────►│    Bridge    │───────────────►│ Serial port │
//! │ subscriber │          │ (poll loop)  │◄───────────────│  (Arduino)  │
//! └────────────┘          └──────┬───────┘   ready bytes  └─────────────┘
//!                                │
//!                                ▼
//!                         ┌──────────────┐
//!                         │ ServoMapping │
//!                         └──────────────┘
//! ```

#![deny(missing_docs)]

pub mod bridge;
pub mod config;
pub mod mapping;
pub mod pubsub;
pub mod serial;

pub use crate::bridge::{Bridge, BridgeStats, LabelSource, StepOutcome};
pub use crate::config::BridgeConfig;
pub use crate::mapping::ServoMapping;
