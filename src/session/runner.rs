//! Session runner
//!
//! State machine executed by the background task:
//!
//! ```text
//! Starting -> WaitingForSubscribers -> Publishing | PartialDelivery
//!          -> (rate > 0: sleep 1/rate, emit again) -> teardown -> Finished
//!          -> (construction/encoding error) Failed -> teardown -> Finished
//! ```
//!
//! Cancellation is cooperative: `SessionHandle::stop` clears the running
//! flag, which the task checks at every poll tick and iteration boundary.
//! An emission already in progress always completes.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use serde_json::Value;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::state::{PublishRate, SessionId, SessionState};
use crate::message::{MessageSchema, SubstitutionContext, fill_message, printable_args};
use crate::notify::{FacetValue, Notification, NotificationSink};
use crate::transport::{PublisherHandle, Transport};

/// Timing knobs of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    /// Upper bound for waiting on the expected subscribers.
    pub connection_wait: Duration,
    /// Resolution of the subscriber wait.
    pub connection_poll: Duration,
    /// Pause before releasing the endpoint so the transport can flush.
    pub teardown_grace: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            connection_wait: Duration::from_secs(25),
            connection_poll: Duration::from_secs(1),
            teardown_grace: Duration::from_secs(2),
        }
    }
}

/// What the operator asked for.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishRequest {
    pub rate: PublishRate,
    pub args: Value,
    /// Defaults to the topic's current subscriber count.
    pub expected_subscribers: Option<usize>,
}

impl PublishRequest {
    pub fn once(args: Value) -> Self {
        Self {
            rate: PublishRate::Once,
            args,
            expected_subscribers: None,
        }
    }
}

/// Collaborators shared by every session.
#[derive(Clone)]
pub struct SessionContext {
    pub transport: Arc<dyn Transport>,
    pub sink: Arc<dyn NotificationSink>,
    pub settings: SessionSettings,
}

pub struct PublishSession {
    id: SessionId,
    topic: String,
    schema: MessageSchema,
    args: Value,
    rate: PublishRate,
    expected_subscribers: Arc<AtomicUsize>,
    running: Arc<AtomicBool>,
    ctx: SessionContext,
}

impl PublishSession {
    pub fn new(
        topic: &str,
        schema: MessageSchema,
        rate: PublishRate,
        args: Value,
        expected_subscribers: usize,
        ctx: SessionContext,
    ) -> Self {
        Self {
            id: SessionId::new(),
            topic: topic.to_string(),
            schema,
            args,
            rate,
            expected_subscribers: Arc::new(AtomicUsize::new(expected_subscribers)),
            running: Arc::new(AtomicBool::new(true)),
            ctx,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Emits `Starting` on the caller's thread, then spawns the task.
    pub fn start(self, runtime: &Handle) -> SessionHandle {
        self.emit_state(SessionState::Starting);
        info!(
            "Starting publish session {} on {} ({}, rate {})",
            self.id, self.topic, self.schema.type_name, self.rate
        );

        let id = self.id;
        let running = self.running.clone();
        let expected_subscribers = self.expected_subscribers.clone();
        let task = runtime.spawn(self.run());
        SessionHandle {
            id,
            running,
            expected_subscribers,
            task,
        }
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn expected(&self) -> usize {
        self.expected_subscribers.load(Ordering::SeqCst)
    }

    fn emit_state(&self, state: SessionState) {
        self.ctx.sink.notify(Notification::Changed {
            topic: self.topic.clone(),
            value: FacetValue::SessionState {
                session: self.id,
                state,
            },
        });
    }

    fn fail(&self, message: String) {
        warn!("Publish session {} on {} failed: {}", self.id, self.topic, message);
        self.emit_state(SessionState::Failed);
        self.ctx.sink.notify(Notification::SessionError {
            topic: self.topic.clone(),
            session: self.id,
            message,
        });
    }

    async fn run(self) {
        self.emit_state(SessionState::WaitingForSubscribers);

        let publisher = match self
            .ctx
            .transport
            .advertise(&self.topic, &self.schema.type_name)
        {
            Ok(publisher) => Some(publisher),
            Err(e) => {
                self.fail(e.to_string());
                None
            }
        };

        if let Some(publisher) = &publisher {
            self.publish_loop(publisher.as_ref()).await;
        }
        self.teardown(publisher).await;
    }

    async fn publish_loop(&self, publisher: &dyn PublisherHandle) {
        let settings = self.ctx.settings;
        let mut first = true;

        while self.is_running() {
            if first {
                let mut waited = Duration::ZERO;
                while self.is_running()
                    && publisher.connection_count() < self.expected()
                    && waited < settings.connection_wait
                {
                    tokio::time::sleep(settings.connection_poll).await;
                    waited += settings.connection_poll;
                }
                first = false;
                if !self.is_running() {
                    break;
                }
            }

            let connections = publisher.connection_count();
            let expected = self.expected();
            if connections < expected {
                debug!(
                    "{}: {connections}/{expected} subscribers connected, publishing anyway",
                    self.topic
                );
                self.emit_state(SessionState::PartialDelivery);
            } else {
                self.emit_state(SessionState::Publishing);
            }

            let message = match fill_message(
                &self.schema,
                &self.args,
                &SubstitutionContext::current(),
            ) {
                Ok(message) => message,
                Err(e) => {
                    self.fail(format!(
                        "{e}\n\nArgs are: [{}]",
                        printable_args(&self.args)
                    ));
                    return;
                }
            };

            if let Err(e) = publisher.emit(&message) {
                self.fail(format!(
                    "Unable to publish message. One of the fields has an incorrect type:\n  {e}\n\nmsg definition:\n{}",
                    self.schema.definition_text()
                ));
                return;
            }

            match self.rate {
                PublishRate::Once => return,
                PublishRate::Hz(hz) => match Duration::try_from_secs_f64(1.0 / hz) {
                    Ok(period) => tokio::time::sleep(period).await,
                    Err(e) => {
                        self.fail(format!("Invalid publish rate {hz} Hz: {e}"));
                        return;
                    }
                },
            }
        }
        debug!("Publish session {} on {} stopped", self.id, self.topic);
    }

    async fn teardown(&self, publisher: Option<Box<dyn PublisherHandle>>) {
        self.running.store(false, Ordering::SeqCst);
        tokio::time::sleep(self.ctx.settings.teardown_grace).await;
        if let Some(publisher) = publisher {
            publisher.release();
        }
        info!("Publish session {} on {} finished", self.id, self.topic);
        self.emit_state(SessionState::Finished);
    }
}

/// The registry's view of a running session.
#[derive(Debug)]
pub struct SessionHandle {
    id: SessionId,
    running: Arc<AtomicBool>,
    expected_subscribers: Arc<AtomicUsize>,
    task: JoinHandle<()>,
}

impl SessionHandle {
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Signals cancellation and returns immediately.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// `false` once stop was requested or the session ended on its own.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// `true` once the background task has completed teardown.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub fn expected_subscribers(&self) -> usize {
        self.expected_subscribers.load(Ordering::SeqCst)
    }

    pub fn set_expected_subscribers(&self, count: usize) {
        self.expected_subscribers.store(count, Ordering::SeqCst);
    }

    /// Waits for the background task to complete.
    pub async fn join(self) {
        if let Err(e) = self.task.await {
            warn!("Publish session {} task ended abnormally: {e}", self.id);
        }
    }
}
