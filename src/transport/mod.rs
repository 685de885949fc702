//! Transport seam.
//!
//! Publish sessions talk to the network only through these traits. The
//! `loopback` module provides an in-memory implementation used by the
//! binary and the tests.

pub mod loopback;

use crate::message::Message;
use crate::utils::error::{EncodingError, TransportError};

pub use loopback::LoopbackTransport;

/// A publishing endpoint for one topic.
pub trait PublisherHandle: Send + Sync {
    /// Number of subscribers currently connected to this endpoint.
    fn connection_count(&self) -> usize;

    fn emit(&self, message: &Message) -> Result<(), EncodingError>;

    /// Unregisters the endpoint. Called exactly once per handle.
    fn release(&self);
}

/// Creates publishing endpoints.
pub trait Transport: Send + Sync {
    fn advertise(
        &self,
        topic: &str,
        type_name: &str,
    ) -> Result<Box<dyn PublisherHandle>, TransportError>;
}
