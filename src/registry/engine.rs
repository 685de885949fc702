//! Registry engine
//!
//! Responsibilities:
//! - reconcile the ordered topic list against full discovery snapshots,
//!   notifying only the facets that actually changed
//! - start, replace and stop the publish session bound to a topic
//! - detach sessions whose background task has completed
//!
//! Concurrency notes:
//! - The registry is owned by one coordinating task and is not shared.
//!   Sessions report back exclusively through the notification sink, so no
//!   background task ever mutates registry state.
//! - Every operation reaps finished sessions first.

use std::sync::Arc;

use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use super::record::{Snapshot, TopicRecord, cmp_ignore_case, cmp_names};
use crate::message::TypeResolver;
use crate::notify::{FacetValue, Notification};
use crate::session::{PublishRequest, PublishSession, SessionContext, SessionHandle, SessionId};
use crate::utils::error::RegistryError;

#[derive(Debug)]
struct Entry {
    record: TopicRecord,
    session: Option<SessionHandle>,
}

pub struct TopicRegistry {
    entries: Vec<Entry>,
    resolver: Arc<dyn TypeResolver>,
    session_ctx: SessionContext,
    runtime: Option<Handle>,
}

impl TopicRegistry {
    pub fn new(resolver: Arc<dyn TypeResolver>, session_ctx: SessionContext) -> Self {
        Self {
            entries: Vec::new(),
            resolver,
            session_ctx,
            runtime: None,
        }
    }

    /// Runtime used to spawn sessions. Without one, the runtime of the
    /// calling task is used.
    pub fn with_runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Records in registry order.
    pub fn records(&self) -> impl Iterator<Item = &TopicRecord> {
        self.entries.iter().map(|e| &e.record)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.record.name())
    }

    pub fn get(&self, name: &str) -> Option<&TopicRecord> {
        self.lookup(name).map(|i| &self.entries[i].record)
    }

    /// `true` while a session bound to `name` has not been asked to stop
    /// and has not ended on its own.
    pub fn has_active_session(&self, name: &str) -> bool {
        self.lookup(name)
            .and_then(|i| self.entries[i].session.as_ref())
            .is_some_and(|s| s.is_running())
    }

    pub fn session_id(&self, name: &str) -> Option<SessionId> {
        self.lookup(name)
            .and_then(|i| self.entries[i].session.as_ref())
            .map(|s| s.id())
    }

    /// Exact position of `name`, or where it would be inserted.
    fn position(&self, name: &str) -> Result<usize, usize> {
        self.entries
            .binary_search_by(|e| cmp_names(e.record.name(), name))
    }

    /// Exact match first, then a case-insensitive one. Names equal up to case
    /// sit next to each other, so only the insertion neighbours need a look.
    fn lookup(&self, name: &str) -> Option<usize> {
        match self.position(name) {
            Ok(i) => Some(i),
            Err(i) => [Some(i), i.checked_sub(1)]
                .into_iter()
                .flatten()
                .filter(|&j| j < self.entries.len())
                .find(|&j| cmp_ignore_case(self.entries[j].record.name(), name).is_eq()),
        }
    }

    fn notify(&self, topic: &str, value: FacetValue) {
        self.session_ctx.sink.notify(Notification::Changed {
            topic: topic.to_string(),
            value,
        });
    }

    /// Brings the registry in line with `snapshot`, the complete current set
    /// of topics.
    ///
    /// Topics missing from the snapshot have their session cancelled and are
    /// removed. Present topics are updated in place with one notification
    /// per changed facet. New topics are merged in sorted position and
    /// announce all three facets once.
    pub fn reconcile(&mut self, snapshot: &Snapshot) {
        self.reap_sessions();
        let sink = self.session_ctx.sink.clone();

        let before = self.entries.len();
        self.entries.retain(|entry| {
            if snapshot.contains_key(entry.record.name()) {
                return true;
            }
            if let Some(session) = &entry.session {
                debug!("Cancelling session {} on vanished topic", session.id());
                session.stop();
            }
            sink.notify(Notification::Removed {
                topic: entry.record.name().to_string(),
            });
            false
        });
        let removed = before - self.entries.len();

        let mut updated = 0;
        for entry in &mut self.entries {
            let Some(info) = snapshot.get(entry.record.name()) else {
                continue;
            };
            let changes = entry.record.apply(info);
            if !changes.any() {
                continue;
            }
            updated += 1;
            let record = &entry.record;
            let topic = || record.name().to_string();
            if changes.publishers {
                sink.notify(Notification::Changed {
                    topic: topic(),
                    value: FacetValue::Publishers(record.publishers().clone()),
                });
            }
            if changes.subscribers {
                if let Some(session) = &entry.session {
                    session.set_expected_subscribers(record.subscribers().len());
                }
                sink.notify(Notification::Changed {
                    topic: topic(),
                    value: FacetValue::Subscribers(record.subscribers().clone()),
                });
            }
            if changes.type_name {
                sink.notify(Notification::Changed {
                    topic: topic(),
                    value: FacetValue::Type(record.type_name().map(str::to_string)),
                });
            }
        }

        let mut fresh: Vec<TopicRecord> = snapshot
            .iter()
            .filter(|(name, _)| {
                if name.is_empty() {
                    warn!("Skipping snapshot entry with an empty topic name");
                    return false;
                }
                self.position(name).is_err()
            })
            .map(|(name, info)| TopicRecord::new(name, info.clone()))
            .collect();
        let created = fresh.len();

        if !fresh.is_empty() {
            fresh.sort_by(|a, b| cmp_names(a.name(), b.name()));
            let mut existing = std::mem::take(&mut self.entries).into_iter().peekable();
            let mut merged = Vec::with_capacity(existing.len() + fresh.len());
            for record in fresh {
                while let Some(entry) =
                    existing.next_if(|e| cmp_names(e.record.name(), record.name()).is_lt())
                {
                    merged.push(entry);
                }
                self.announce(&record);
                merged.push(Entry {
                    record,
                    session: None,
                });
            }
            merged.extend(existing);
            self.entries = merged;
        }

        debug!(
            "Reconciled {} topics: {created} created, {updated} updated, {removed} removed",
            self.entries.len()
        );
    }

    /// First observation of a topic: every facet renders once.
    fn announce(&self, record: &TopicRecord) {
        self.notify(record.name(), FacetValue::Publishers(record.publishers().clone()));
        self.notify(record.name(), FacetValue::Subscribers(record.subscribers().clone()));
        self.notify(
            record.name(),
            FacetValue::Type(record.type_name().map(str::to_string)),
        );
    }

    /// Starts a publish session on `name`, replacing any session already
    /// bound to it. Returns as soon as the session task is spawned.
    ///
    /// Unknown topics and types that cannot be resolved are reported here,
    /// before any background work starts. Failures past that point arrive as
    /// notifications.
    pub fn start_publish(
        &mut self,
        name: &str,
        request: PublishRequest,
    ) -> Result<SessionId, RegistryError> {
        self.reap_sessions();
        let index = self
            .lookup(name)
            .ok_or_else(|| RegistryError::UnknownTopic(name.to_string()))?;
        let runtime = self
            .runtime
            .clone()
            .or_else(|| Handle::try_current().ok())
            .ok_or(RegistryError::NoRuntime)?;

        let entry = &mut self.entries[index];
        let topic = entry.record.name().to_string();
        let type_name = entry
            .record
            .type_name()
            .ok_or_else(|| RegistryError::UnresolvedType {
                topic: topic.clone(),
                reason: "topic type is not known yet".to_string(),
            })?;
        let schema =
            self.resolver
                .resolve(type_name)
                .map_err(|e| RegistryError::UnresolvedType {
                    topic: topic.clone(),
                    reason: e.to_string(),
                })?;

        if let Some(previous) = entry.session.take() {
            info!("Replacing publish session {} on {topic}", previous.id());
            previous.stop();
        }

        let expected = request
            .expected_subscribers
            .unwrap_or(entry.record.subscribers().len());
        let session = PublishSession::new(
            &topic,
            schema,
            request.rate,
            request.args,
            expected,
            self.session_ctx.clone(),
        );
        let handle = session.start(&runtime);
        let id = handle.id();
        entry.session = Some(handle);
        Ok(id)
    }

    /// Asks the session bound to `name` to stop. Teardown happens in the
    /// session's own task; a topic without a session is left alone.
    pub fn stop_publish(&mut self, name: &str) -> Result<(), RegistryError> {
        self.reap_sessions();
        let index = self
            .lookup(name)
            .ok_or_else(|| RegistryError::UnknownTopic(name.to_string()))?;
        if let Some(session) = &self.entries[index].session {
            info!("Stopping publish session {} on {name}", session.id());
            session.stop();
        }
        Ok(())
    }

    /// Detaches sessions whose task has completed.
    pub fn reap_sessions(&mut self) {
        for entry in &mut self.entries {
            if entry.session.as_ref().is_some_and(|s| s.is_finished()) {
                if let Some(session) = entry.session.take() {
                    debug!(
                        "Detached session {} from {}",
                        session.id(),
                        entry.record.name()
                    );
                }
            }
        }
    }

    /// Stops every session and hands back their handles so the caller can
    /// wait for teardown.
    pub fn stop_all(&mut self) -> Vec<SessionHandle> {
        self.entries
            .iter_mut()
            .filter_map(|e| e.session.take())
            .inspect(|s| s.stop())
            .collect()
    }
}
