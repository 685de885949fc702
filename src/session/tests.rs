use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::runtime::Handle;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::Instant;

use super::{PublishRate, PublishSession, SessionContext, SessionHandle, SessionSettings, SessionState};
use crate::message::{StaticTypeResolver, TypeResolver};
use crate::notify::{ChannelSink, Notification};
use crate::transport::LoopbackTransport;
use crate::utils::error::InvalidRate;

const TOPIC: &str = "/points";

fn setup(transport: &LoopbackTransport) -> (SessionContext, UnboundedReceiver<Notification>) {
    let (sink, rx) = ChannelSink::new();
    let ctx = SessionContext {
        transport: Arc::new(transport.clone()),
        sink: Arc::new(sink),
        settings: SessionSettings::default(),
    };
    (ctx, rx)
}

fn start(
    ctx: SessionContext,
    rate: PublishRate,
    args: serde_json::Value,
    expected: usize,
) -> SessionHandle {
    let mut resolver = StaticTypeResolver::default();
    resolver.register("geometry/Point", &["float64 x", "float64 y"]);
    let schema = resolver.resolve("geometry/Point").unwrap();
    PublishSession::new(TOPIC, schema, rate, args, expected, ctx).start(&Handle::current())
}

/// Collects states and error messages up to and including `Finished`.
async fn run_to_finish(
    rx: &mut UnboundedReceiver<Notification>,
) -> (Vec<SessionState>, Vec<String>) {
    let mut states = Vec::new();
    let mut errors = Vec::new();
    while let Some(n) = rx.recv().await {
        match n {
            Notification::SessionError { message, .. } => errors.push(message),
            other => {
                let state = other.session_state().expect("only session notifications");
                states.push(state);
                if state == SessionState::Finished {
                    break;
                }
            }
        }
    }
    (states, errors)
}

#[tokio::test(start_paused = true)]
async fn test_publish_once_runs_full_lifecycle() {
    let transport = LoopbackTransport::default();
    let (ctx, mut rx) = setup(&transport);

    let handle = start(ctx, PublishRate::Once, json!({"x": 1.0}), 0);
    let (states, errors) = run_to_finish(&mut rx).await;

    assert_eq!(
        states,
        vec![
            SessionState::Starting,
            SessionState::WaitingForSubscribers,
            SessionState::Publishing,
            SessionState::Finished,
        ]
    );
    assert!(errors.is_empty());
    assert_eq!(transport.sent(TOPIC).len(), 1);
    assert_eq!(transport.advertised(TOPIC), 0);

    handle.join().await;
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(rx.try_recv().is_err(), "finished must be terminal");
}

#[tokio::test(start_paused = true)]
async fn test_partial_delivery_after_wait_timeout() {
    let transport = LoopbackTransport::default();
    transport.set_connections(TOPIC, 1);
    let (ctx, mut rx) = setup(&transport);

    let started = Instant::now();
    let _handle = start(ctx, PublishRate::Once, json!([1.0, 2.0]), 2);
    let (states, _) = run_to_finish(&mut rx).await;

    assert_eq!(states[2], SessionState::PartialDelivery);
    assert!(!states.contains(&SessionState::Publishing));
    assert!(started.elapsed() >= Duration::from_secs(25));
    assert_eq!(transport.sent(TOPIC).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_publishes_once_subscribers_connect() {
    let transport = LoopbackTransport::default();
    let (ctx, mut rx) = setup(&transport);

    let started = Instant::now();
    let _handle = start(ctx, PublishRate::Once, json!(null), 1);
    let late = transport.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(3)).await;
        late.set_connections(TOPIC, 1);
    });

    let (states, _) = run_to_finish(&mut rx).await;
    assert_eq!(states[2], SessionState::Publishing);
    assert!(started.elapsed() < Duration::from_secs(25));
}

#[tokio::test(start_paused = true)]
async fn test_lowering_expected_subscribers_ends_wait() {
    let transport = LoopbackTransport::default();
    transport.set_connections(TOPIC, 1);
    let (ctx, mut rx) = setup(&transport);

    let handle = start(ctx, PublishRate::Once, json!(null), 3);
    assert_eq!(handle.expected_subscribers(), 3);
    handle.set_expected_subscribers(1);

    let (states, _) = run_to_finish(&mut rx).await;
    assert_eq!(states[2], SessionState::Publishing);
}

#[tokio::test(start_paused = true)]
async fn test_construction_error_fails_session() {
    let transport = LoopbackTransport::default();
    let (ctx, mut rx) = setup(&transport);

    let _handle = start(ctx, PublishRate::Hz(10.0), json!({"x": "bad"}), 0);
    let (states, errors) = run_to_finish(&mut rx).await;

    assert_eq!(
        states,
        vec![
            SessionState::Starting,
            SessionState::WaitingForSubscribers,
            SessionState::Publishing,
            SessionState::Failed,
            SessionState::Finished,
        ]
    );
    assert_eq!(errors.len(), 1);
    assert!(errors[0].starts_with("field 'x': expected float64"));
    assert!(errors[0].ends_with("Args are: [x: \"bad\"]"));
    assert!(transport.sent(TOPIC).is_empty());
    assert_eq!(transport.advertised(TOPIC), 0);
}

#[tokio::test(start_paused = true)]
async fn test_encoding_error_reports_definition() {
    let transport = LoopbackTransport::new(4);
    let (ctx, mut rx) = setup(&transport);

    let _handle = start(ctx, PublishRate::Once, json!({"x": 1.0}), 0);
    let (states, errors) = run_to_finish(&mut rx).await;

    assert!(states.contains(&SessionState::Failed));
    assert_eq!(errors.len(), 1);
    assert!(errors[0].starts_with("Unable to publish message."));
    assert!(errors[0].contains("msg definition:\nfloat64 x\nfloat64 y\n"));
}

#[tokio::test(start_paused = true)]
async fn test_advertise_failure_fails_session() {
    let transport = LoopbackTransport::default();
    transport.refuse(TOPIC);
    let (ctx, mut rx) = setup(&transport);

    let _handle = start(ctx, PublishRate::Once, json!(null), 0);
    let (states, errors) = run_to_finish(&mut rx).await;

    assert_eq!(
        states,
        vec![
            SessionState::Starting,
            SessionState::WaitingForSubscribers,
            SessionState::Failed,
            SessionState::Finished,
        ]
    );
    assert_eq!(errors.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_stop_ends_periodic_session() {
    let transport = LoopbackTransport::default();
    let (ctx, mut rx) = setup(&transport);

    let handle = start(ctx, PublishRate::Hz(10.0), json!({"x": 1.0}), 0);
    let mut published = 0;
    while published < 3 {
        if rx.recv().await.and_then(|n| n.session_state()) == Some(SessionState::Publishing) {
            published += 1;
        }
    }
    handle.stop();
    assert!(!handle.is_running());

    let (states, _) = run_to_finish(&mut rx).await;
    assert_eq!(states.last(), Some(&SessionState::Finished));
    assert_eq!(
        states.iter().filter(|s| **s == SessionState::Finished).count(),
        1
    );
    let sent = transport.sent(TOPIC).len();
    assert!((3..=4).contains(&sent), "sent {sent}");

    handle.join().await;
    assert_eq!(transport.advertised(TOPIC), 0);
}

#[tokio::test(start_paused = true)]
async fn test_stop_while_waiting_skips_publishing() {
    let transport = LoopbackTransport::default();
    let (ctx, mut rx) = setup(&transport);

    let handle = start(ctx, PublishRate::Once, json!(null), 5);
    handle.stop();

    let (states, _) = run_to_finish(&mut rx).await;
    assert_eq!(
        states,
        vec![
            SessionState::Starting,
            SessionState::WaitingForSubscribers,
            SessionState::Finished,
        ]
    );
    assert!(transport.sent(TOPIC).is_empty());
}

#[test]
fn test_publish_rate_parsing() {
    assert_eq!("once".parse::<PublishRate>(), Ok(PublishRate::Once));
    assert_eq!(" ONCE ".parse::<PublishRate>(), Ok(PublishRate::Once));
    assert_eq!("2.5".parse::<PublishRate>(), Ok(PublishRate::Hz(2.5)));
    assert_eq!("-1".parse::<PublishRate>(), Ok(PublishRate::Once));
    assert_eq!("0".parse::<PublishRate>(), Ok(PublishRate::Once));
    assert_eq!(
        "fast".parse::<PublishRate>(),
        Err(InvalidRate("fast".to_string()))
    );
    assert!("inf".parse::<PublishRate>().is_err());
    assert!("1e-20".parse::<PublishRate>().is_err());
    assert!("5e-324".parse::<PublishRate>().is_err());
    assert!(PublishRate::from_hz(1e-6).is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_unrepresentable_period_fails_session() {
    let transport = LoopbackTransport::default();
    let (ctx, mut rx) = setup(&transport);

    let handle = start(ctx, PublishRate::Hz(1e-20), json!({"x": 1.0}), 0);
    let (states, errors) = run_to_finish(&mut rx).await;

    assert_eq!(
        states,
        vec![
            SessionState::Starting,
            SessionState::WaitingForSubscribers,
            SessionState::Publishing,
            SessionState::Failed,
            SessionState::Finished,
        ]
    );
    assert_eq!(errors.len(), 1);
    assert!(errors[0].starts_with("Invalid publish rate"));
    assert_eq!(transport.sent(TOPIC).len(), 1);

    handle.join().await;
    assert_eq!(transport.advertised(TOPIC), 0);
}

#[tokio::test(start_paused = true)]
async fn test_periodic_session_reevaluates_delivery_each_cycle() {
    let transport = LoopbackTransport::default();
    let (ctx, mut rx) = setup(&transport);

    let started = Instant::now();
    let handle = start(ctx, PublishRate::Hz(1.0), json!({"x": 1.0}), 2);
    let late = transport.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(25_500)).await;
        late.set_connections(TOPIC, 2);
    });

    let mut states = Vec::new();
    while let Some(n) = rx.recv().await {
        let state = n.session_state().expect("only session notifications");
        states.push(state);
        if state == SessionState::Publishing {
            break;
        }
    }
    assert!(started.elapsed() < Duration::from_secs(27));
    assert_eq!(
        states,
        vec![
            SessionState::Starting,
            SessionState::WaitingForSubscribers,
            SessionState::PartialDelivery,
            SessionState::Publishing,
        ]
    );

    handle.stop();
    let (rest, _) = run_to_finish(&mut rx).await;
    assert!(!rest.contains(&SessionState::WaitingForSubscribers));
    assert_eq!(rest.last(), Some(&SessionState::Finished));
}
