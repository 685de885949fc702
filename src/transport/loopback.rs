//! In-memory transport.
//!
//! Messages are encoded to JSON. The most recent ones are kept per topic so
//! they can be inspected; older ones are dropped once the history is full.
//! Connection counts are set from the outside to simulate subscribers
//! attaching. Encoding enforces a size limit and rejects non-finite floats.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;

use super::{PublisherHandle, Transport};
use crate::message::{FieldValue, Message};
use crate::utils::error::{EncodingError, TransportError};

#[derive(Debug, Default)]
struct TopicState {
    advertised: usize,
    connections: usize,
    emitted: usize,
    sent: VecDeque<Vec<u8>>,
}

#[derive(Debug, Default)]
struct Shared {
    topics: HashMap<String, TopicState>,
    refused: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct LoopbackTransport {
    shared: Arc<Mutex<Shared>>,
    max_message_bytes: usize,
    history_limit: usize,
}

impl Default for LoopbackTransport {
    fn default() -> Self {
        Self::new(64 * 1024)
    }
}

pub const DEFAULT_HISTORY_LIMIT: usize = 64;

impl LoopbackTransport {
    pub fn new(max_message_bytes: usize) -> Self {
        Self {
            shared: Arc::new(Mutex::new(Shared::default())),
            max_message_bytes,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }

    /// Keeps at most `limit` encoded messages per topic.
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        // State stays consistent even if a holder panicked.
        self.shared.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Simulates `count` subscribers being connected to `topic`.
    pub fn set_connections(&self, topic: &str, count: usize) {
        self.lock()
            .topics
            .entry(topic.to_string())
            .or_default()
            .connections = count;
    }

    /// Makes every later `advertise` for `topic` fail.
    pub fn refuse(&self, topic: &str) {
        self.lock().refused.push(topic.to_string());
    }

    /// The most recent encoded messages emitted on `topic`, oldest first.
    pub fn sent(&self, topic: &str) -> Vec<Vec<u8>> {
        self.lock()
            .topics
            .get(topic)
            .map(|t| t.sent.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Total number of messages emitted on `topic`, including dropped ones.
    pub fn emitted(&self, topic: &str) -> usize {
        self.lock().topics.get(topic).map_or(0, |t| t.emitted)
    }

    /// Number of live (advertised, not yet released) endpoints for `topic`.
    pub fn advertised(&self, topic: &str) -> usize {
        self.lock().topics.get(topic).map_or(0, |t| t.advertised)
    }
}

impl Transport for LoopbackTransport {
    fn advertise(
        &self,
        topic: &str,
        type_name: &str,
    ) -> Result<Box<dyn PublisherHandle>, TransportError> {
        let mut shared = self.lock();
        if shared.refused.iter().any(|t| t == topic) {
            return Err(TransportError::Advertise {
                topic: topic.to_string(),
                reason: "refused by transport".to_string(),
            });
        }
        shared.topics.entry(topic.to_string()).or_default().advertised += 1;
        debug!("Advertised {topic} as {type_name}");

        Ok(Box::new(LoopbackPublisher {
            topic: topic.to_string(),
            transport: self.clone(),
        }))
    }
}

struct LoopbackPublisher {
    topic: String,
    transport: LoopbackTransport,
}

impl PublisherHandle for LoopbackPublisher {
    fn connection_count(&self) -> usize {
        self.transport
            .lock()
            .topics
            .get(&self.topic)
            .map_or(0, |t| t.connections)
    }

    fn emit(&self, message: &Message) -> Result<(), EncodingError> {
        check_finite(message, "")?;
        let bytes =
            serde_json::to_vec(message).map_err(|e| EncodingError::Serialize(e.to_string()))?;
        if bytes.len() > self.transport.max_message_bytes {
            return Err(EncodingError::TooLarge {
                size: bytes.len(),
                limit: self.transport.max_message_bytes,
            });
        }
        let limit = self.transport.history_limit;
        let mut shared = self.transport.lock();
        let state = shared.topics.entry(self.topic.clone()).or_default();
        state.emitted += 1;
        if limit == 0 {
            return Ok(());
        }
        if state.sent.len() >= limit {
            state.sent.pop_front();
        }
        state.sent.push_back(bytes);
        Ok(())
    }

    fn release(&self) {
        if let Some(state) = self.transport.lock().topics.get_mut(&self.topic) {
            state.advertised = state.advertised.saturating_sub(1);
        }
        debug!("Released publisher for {}", self.topic);
    }
}

fn check_finite(message: &Message, prefix: &str) -> Result<(), EncodingError> {
    for (name, value) in &message.fields {
        let path = if prefix.is_empty() {
            name.clone()
        } else {
            format!("{prefix}.{name}")
        };
        check_value(value, &path)?;
    }
    Ok(())
}

fn check_value(value: &FieldValue, path: &str) -> Result<(), EncodingError> {
    match value {
        FieldValue::Float(v) if !v.is_finite() => Err(EncodingError::Field {
            field: path.to_string(),
            reason: format!("{v} cannot be encoded"),
        }),
        FieldValue::Array(items) => items
            .iter()
            .enumerate()
            .try_for_each(|(i, item)| check_value(item, &format!("{path}[{i}]"))),
        FieldValue::Message(nested) => check_finite(nested, path),
        _ => Ok(()),
    }
}
