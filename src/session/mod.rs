//! Publish sessions.
//!
//! A session owns one background task that advertises a topic, waits for
//! the expected subscribers, then synthesizes and emits messages until it
//! completes, fails, or is stopped. Every state change leaves the task as a
//! notification; the task never touches registry state.

pub mod runner;
pub mod state;

pub use runner::{PublishRequest, PublishSession, SessionContext, SessionHandle, SessionSettings};
pub use state::{PublishRate, SessionId, SessionState};

#[cfg(test)]
mod tests;
