//! Notification contract between the core and whatever renders it.
//!
//! The registry and the publish sessions never touch presentation state.
//! They describe what changed as `Notification` values and hand them to an
//! injected `NotificationSink`. Sinks must be callable from any thread:
//! sessions emit from their own background task.

use std::collections::BTreeSet;

use serde::Serialize;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tracing::{info, warn};

use crate::registry::NodeId;
use crate::session::{SessionId, SessionState};

/// The independently tracked attributes of a topic row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Facet {
    Publishers,
    Subscribers,
    Type,
    SessionState,
}

/// New value of a facet.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "facet", content = "value", rename_all = "snake_case")]
pub enum FacetValue {
    Publishers(BTreeSet<NodeId>),
    Subscribers(BTreeSet<NodeId>),
    Type(Option<String>),
    SessionState {
        session: SessionId,
        state: SessionState,
    },
}

impl FacetValue {
    pub fn facet(&self) -> Facet {
        match self {
            FacetValue::Publishers(_) => Facet::Publishers,
            FacetValue::Subscribers(_) => Facet::Subscribers,
            FacetValue::Type(_) => Facet::Type,
            FacetValue::SessionState { .. } => Facet::SessionState,
        }
    }
}

/// One event emitted towards the rendering layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    Changed {
        topic: String,
        #[serde(flatten)]
        value: FacetValue,
    },
    SessionError {
        topic: String,
        session: SessionId,
        message: String,
    },
    Removed {
        topic: String,
    },
}

impl Notification {
    pub fn topic(&self) -> &str {
        match self {
            Notification::Changed { topic, .. }
            | Notification::SessionError { topic, .. }
            | Notification::Removed { topic } => topic,
        }
    }

    /// The facet this notification touches, if it is a facet change.
    pub fn facet(&self) -> Option<Facet> {
        match self {
            Notification::Changed { value, .. } => Some(value.facet()),
            _ => None,
        }
    }

    /// The session state carried by this notification, if any.
    pub fn session_state(&self) -> Option<SessionState> {
        match self {
            Notification::Changed {
                value: FacetValue::SessionState { state, .. },
                ..
            } => Some(*state),
            _ => None,
        }
    }
}

/// Receives notifications. Implementations decide how they reach the UI.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Sink backed by an unbounded tokio channel.
///
/// The consumer drains the paired receiver on its own thread, so delivery
/// is never synchronous with the emitting task.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: UnboundedSender<Notification>,
}

impl ChannelSink {
    pub fn new() -> (Self, UnboundedReceiver<Notification>) {
        let (sender, receiver) = unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl NotificationSink for ChannelSink {
    fn notify(&self, notification: Notification) {
        // A dropped receiver means nobody is rendering anymore.
        let _ = self.sender.send(notification);
    }
}

/// Sink that renders every notification as a log line.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn notify(&self, notification: Notification) {
        match &notification {
            Notification::SessionError {
                topic,
                session,
                message,
            } => warn!("Publish error on {topic} (session {session}): {message}"),
            Notification::Removed { topic } => info!("Topic {topic} removed"),
            Notification::Changed { topic, value } => match value {
                FacetValue::Publishers(nodes) => {
                    info!("{topic}: {} publisher(s) {:?}", nodes.len(), nodes)
                }
                FacetValue::Subscribers(nodes) => {
                    info!("{topic}: {} subscriber(s) {:?}", nodes.len(), nodes)
                }
                FacetValue::Type(type_name) => {
                    info!("{topic}: type {}", type_name.as_deref().unwrap_or("None"))
                }
                FacetValue::SessionState { session, state } => {
                    info!("{topic}: session {session} is {state}")
                }
            },
        }
    }
}
