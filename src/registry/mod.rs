//! Topic registry
//!
//! Keeps the ordered set of known topics in step with the snapshots handed
//! over by discovery, and binds at most one publish session to each topic.

pub mod engine;
pub mod record;

pub use engine::TopicRegistry;
pub use record::{FacetChanges, NodeId, Snapshot, TopicInfo, TopicRecord, cmp_names};
