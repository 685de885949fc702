use std::time::Duration;

use serde::Deserialize;

use crate::message::TypeDefinition;
use crate::session::SessionSettings;

/// Top-level configuration settings for the application.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub discovery: DiscoverySettings,
    pub publish: PublishSettings,
    pub transport: TransportSettings,
    /// Message types the static resolver knows about.
    pub types: Vec<TypeDefinition>,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    pub level: String,
}

/// Where snapshots come from and how often they are read.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct DiscoverySettings {
    pub snapshot_path: String,
    pub poll_interval_ms: u64,
}

/// Timing of publish sessions.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct PublishSettings {
    pub connection_wait_secs: u64,
    pub connection_poll_ms: u64,
    pub teardown_grace_ms: u64,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct TransportSettings {
    pub max_message_bytes: usize,
    /// Encoded messages the loopback transport keeps per topic.
    pub history_limit: usize,
}

/// Partial configuration settings loaded from files or environment.
///
/// Missing values are filled in from `Settings::default()`.
#[derive(Debug, Deserialize)]
pub struct PartialSettings {
    pub logging: Option<PartialLoggingSettings>,
    pub discovery: Option<PartialDiscoverySettings>,
    pub publish: Option<PartialPublishSettings>,
    pub transport: Option<PartialTransportSettings>,
    pub types: Option<Vec<TypeDefinition>>,
}

#[derive(Debug, Deserialize)]
pub struct PartialLoggingSettings {
    pub level: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PartialDiscoverySettings {
    pub snapshot_path: Option<String>,
    pub poll_interval_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct PartialPublishSettings {
    pub connection_wait_secs: Option<u64>,
    pub connection_poll_ms: Option<u64>,
    pub teardown_grace_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct PartialTransportSettings {
    pub max_message_bytes: Option<usize>,
    pub history_limit: Option<usize>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            logging: LoggingSettings {
                level: "info".to_string(),
            },
            discovery: DiscoverySettings {
                snapshot_path: "snapshot.json".to_string(),
                poll_interval_ms: 1000,
            },
            publish: PublishSettings {
                connection_wait_secs: 25,
                connection_poll_ms: 1000,
                teardown_grace_ms: 2000,
            },
            transport: TransportSettings {
                max_message_bytes: 64 * 1024,
                history_limit: 64,
            },
            types: Vec::new(),
        }
    }
}

impl From<&PublishSettings> for SessionSettings {
    fn from(publish: &PublishSettings) -> Self {
        Self {
            connection_wait: Duration::from_secs(publish.connection_wait_secs),
            // a zero poll would spin
            connection_poll: Duration::from_millis(publish.connection_poll_ms.max(1)),
            teardown_grace: Duration::from_millis(publish.teardown_grace_ms),
        }
    }
}
