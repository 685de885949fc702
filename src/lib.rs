//! # topicmon
//!
//! `topicmon` tracks the live set of publish/subscribe topics reported by a
//! discovery source and lets an operator inject synthetic messages onto a
//! chosen topic for testing.
//!
//! ## Core Modules
//!
//! - `registry`: the ordered topic registry and its snapshot reconciliation.
//! - `session`: background publish sessions and their state machine.
//! - `message`: message schemas, type resolution and argument filling.
//! - `notify`: the notification contract consumed by a rendering layer.
//! - `transport`: the publishing seam plus an in-memory loopback transport.
//! - `discovery`: snapshot sources.
//! - `config`: loading and merging configuration.
//! - `utils`: error types and logging setup.

pub mod config;
pub mod discovery;
pub mod message;
pub mod notify;
pub mod registry;
pub mod session;
pub mod transport;
pub mod utils;
