//! The `error` module defines the error types used within `topicmon`.
//!
//! Errors fall into two groups. Registry-level errors (`RegistryError`) are
//! returned synchronously to whoever called `start_publish`. Everything a
//! publish session can hit while running (`MessageConstructionError`,
//! `EncodingError`, `TransportError`) is rendered into a notification and
//! never crosses the task boundary.

use thiserror::Error;

/// Errors returned synchronously by `TopicRegistry` operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("unknown topic: {0}")]
    UnknownTopic(String),

    #[error("cannot publish to {topic}: {reason}")]
    UnresolvedType { topic: String, reason: String },

    #[error("no async runtime available to run the publish session")]
    NoRuntime,
}

/// Failure to turn a type name into a message schema.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    #[error("invalid message type: {0}")]
    UnknownType(String),

    #[error("invalid field definition '{definition}' in {type_name}")]
    InvalidField {
        type_name: String,
        definition: String,
    },

    #[error("message type {0} contains itself")]
    Cycle(String),
}

/// Bad field arguments detected while building a message instance.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MessageConstructionError {
    #[error("field '{field}': expected {expected}, got {found}")]
    TypeMismatch {
        field: String,
        expected: String,
        found: String,
    },

    #[error("field '{field}': value {value} out of range for {field_type}")]
    OutOfRange {
        field: String,
        value: String,
        field_type: String,
    },

    #[error("unknown field '{field}' for {type_name}")]
    UnknownField { field: String, type_name: String },

    #[error("{type_name} expects {expected} positional arguments, got {found}")]
    ArgumentCount {
        type_name: String,
        expected: usize,
        found: usize,
    },
}

/// The transport rejected a constructed message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodingError {
    #[error("field '{field}': {reason}")]
    Field { field: String, reason: String },

    #[error("encoded message is {size} bytes, limit is {limit}")]
    TooLarge { size: usize, limit: usize },

    #[error("serialization failed: {0}")]
    Serialize(String),
}

/// Failure to advertise a publishing endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("cannot advertise {topic}: {reason}")]
    Advertise { topic: String, reason: String },
}

/// Failure to read a snapshot from the discovery source.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("failed to read snapshot: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot is not a JSON object of topics: {0}")]
    Json(#[from] serde_json::Error),
}

/// A publish rate that is neither `once` nor a finite number.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid publish rate '{0}': expected 'once' or a number of messages per second")]
pub struct InvalidRate(pub String);
