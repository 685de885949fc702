//! The `discovery` module supplies topic snapshots to the registry.
//!
//! `FileDiscovery` reads a JSON document mapping topic names to their
//! metadata:
//!
//! ```json
//! { "/chatter": { "publishers": ["/talker"], "subscribers": [], "type": "std_msgs/String" } }
//! ```
//!
//! Entries that do not parse are skipped one by one so a single bad entry
//! never hides the rest of the snapshot.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::registry::{Snapshot, TopicInfo, TopicRegistry};
use crate::utils::error::DiscoveryError;

#[derive(Debug, Clone)]
pub struct FileDiscovery {
    path: PathBuf,
}

impl FileDiscovery {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the current snapshot from disk.
    pub async fn poll(&self) -> Result<Snapshot, DiscoveryError> {
        let raw = tokio::fs::read_to_string(&self.path).await?;
        parse_snapshot(&raw)
    }
}

/// Reconciles `registry` against `discovery` every `interval` until
/// `shutdown` completes, and returns the number of polls made.
///
/// `shutdown` is polled as one pinned future across iterations, so a signal
/// that arrives while a snapshot is being applied is still observed.
pub async fn follow<F>(
    discovery: &FileDiscovery,
    registry: &mut TopicRegistry,
    interval: Duration,
    shutdown: F,
) -> usize
where
    F: Future<Output = ()>,
{
    let mut ticker = tokio::time::interval(interval);
    tokio::pin!(shutdown);
    let mut polls = 0;
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                polls += 1;
                match discovery.poll().await {
                    Ok(snapshot) => registry.reconcile(&snapshot),
                    Err(e) => warn!("Discovery poll failed: {}", e),
                }
            }
            _ = &mut shutdown => {
                info!("Shutdown requested after {polls} discovery polls");
                break;
            }
        }
    }
    polls
}

/// Parses a snapshot document, dropping malformed entries.
pub fn parse_snapshot(raw: &str) -> Result<Snapshot, DiscoveryError> {
    let entries: Map<String, Value> = serde_json::from_str(raw)?;
    let mut snapshot = Snapshot::with_capacity(entries.len());
    for (name, value) in entries {
        if name.is_empty() {
            warn!("Skipping snapshot entry with an empty topic name");
            continue;
        }
        match serde_json::from_value::<TopicInfo>(value) {
            Ok(info) => {
                snapshot.insert(name, info);
            }
            Err(e) => warn!("Skipping malformed snapshot entry {name}: {e}"),
        }
    }
    Ok(snapshot)
}

#[cfg(test)]
mod tests;
