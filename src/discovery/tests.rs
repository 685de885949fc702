use std::fs;
use std::sync::Arc;
use std::time::Duration;

use tempfile::tempdir;

use super::{FileDiscovery, follow, parse_snapshot};
use crate::message::StaticTypeResolver;
use crate::notify::ChannelSink;
use crate::registry::TopicRegistry;
use crate::session::{SessionContext, SessionSettings};
use crate::transport::LoopbackTransport;
use crate::utils::error::DiscoveryError;

#[test]
fn test_parse_snapshot() {
    let snapshot = parse_snapshot(
        r#"{
            "/chatter": {"publishers": ["/talker"], "subscribers": ["/listener"], "type": "std_msgs/String"},
            "/rosout": {}
        }"#,
    )
    .unwrap();

    assert_eq!(snapshot.len(), 2);
    let chatter = &snapshot["/chatter"];
    assert!(chatter.publishers.contains("/talker"));
    assert!(chatter.subscribers.contains("/listener"));
    assert_eq!(chatter.type_name.as_deref(), Some("std_msgs/String"));
    assert_eq!(snapshot["/rosout"].type_name, None);
}

#[test]
fn test_malformed_entries_are_skipped_individually() {
    let snapshot = parse_snapshot(
        r#"{
            "/good": {"publishers": ["/a"]},
            "/bad": {"publishers": "not-a-list"},
            "": {"publishers": []},
            "/worse": 42
        }"#,
    )
    .unwrap();

    assert_eq!(snapshot.len(), 1);
    assert!(snapshot.contains_key("/good"));
}

#[test]
fn test_non_object_document_is_rejected() {
    assert!(matches!(
        parse_snapshot("[1, 2]"),
        Err(DiscoveryError::Json(_))
    ));
}

#[tokio::test]
async fn test_file_discovery_reads_snapshot() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("snapshot.json");
    fs::write(&path, r#"{"/a": {"type": "pkg/Msg"}}"#).unwrap();

    let discovery = FileDiscovery::new(&path);
    let snapshot = discovery.poll().await.unwrap();
    assert_eq!(snapshot["/a"].type_name.as_deref(), Some("pkg/Msg"));
}

#[tokio::test]
async fn test_file_discovery_missing_file() {
    let dir = tempdir().unwrap();
    let discovery = FileDiscovery::new(dir.path().join("absent.json"));
    assert!(matches!(discovery.poll().await, Err(DiscoveryError::Io(_))));
}

#[tokio::test]
async fn test_follow_stops_on_shutdown_spanning_several_polls() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("snapshot.json");
    fs::write(&path, r#"{"/a": {"type": "pkg/Msg"}, "/b": {}}"#).unwrap();

    let (sink, _rx) = ChannelSink::new();
    let ctx = SessionContext {
        transport: Arc::new(LoopbackTransport::default()),
        sink: Arc::new(sink),
        settings: SessionSettings::default(),
    };
    let mut registry = TopicRegistry::new(Arc::new(StaticTypeResolver::default()), ctx);
    let discovery = FileDiscovery::new(&path);

    // The shutdown deadline is longer than the poll interval, so it only
    // fires if the same future survives across loop iterations.
    let polls = tokio::time::timeout(
        Duration::from_secs(5),
        follow(
            &discovery,
            &mut registry,
            Duration::from_millis(10),
            tokio::time::sleep(Duration::from_millis(45)),
        ),
    )
    .await
    .expect("shutdown was not observed");

    assert!(polls >= 2, "polls {polls}");
    assert_eq!(registry.len(), 2);
}
