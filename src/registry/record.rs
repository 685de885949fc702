//! Topic records
//!
//! A `TopicRecord` is keyed by its name, which never changes after creation.
//! Its publisher set, subscriber set and type are replaced wholesale by each
//! snapshot. Records are ordered case-insensitively by name, ties broken by
//! the exact name so the order stays total.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

pub type NodeId = String;

/// Metadata for one topic as reported by discovery.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct TopicInfo {
    #[serde(default)]
    pub publishers: BTreeSet<NodeId>,
    #[serde(default)]
    pub subscribers: BTreeSet<NodeId>,
    #[serde(rename = "type", default)]
    pub type_name: Option<String>,
}

/// Complete listing of topics at one point in time.
pub type Snapshot = HashMap<String, TopicInfo>;

/// Case-insensitive name order used for registry placement.
pub fn cmp_names(a: &str, b: &str) -> Ordering {
    cmp_ignore_case(a, b).then_with(|| a.cmp(b))
}

pub(crate) fn cmp_ignore_case(a: &str, b: &str) -> Ordering {
    a.chars()
        .flat_map(char::to_lowercase)
        .cmp(b.chars().flat_map(char::to_lowercase))
}

/// Which facets an update touched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FacetChanges {
    pub publishers: bool,
    pub subscribers: bool,
    pub type_name: bool,
}

impl FacetChanges {
    pub fn any(&self) -> bool {
        self.publishers || self.subscribers || self.type_name
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopicRecord {
    name: String,
    publishers: BTreeSet<NodeId>,
    subscribers: BTreeSet<NodeId>,
    #[serde(rename = "type")]
    type_name: Option<String>,
}

impl TopicRecord {
    pub fn new(name: &str, info: TopicInfo) -> Self {
        Self {
            name: name.to_string(),
            publishers: info.publishers,
            subscribers: info.subscribers,
            type_name: info.type_name,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn publishers(&self) -> &BTreeSet<NodeId> {
        &self.publishers
    }

    pub fn subscribers(&self) -> &BTreeSet<NodeId> {
        &self.subscribers
    }

    pub fn type_name(&self) -> Option<&str> {
        self.type_name.as_deref()
    }

    /// Replaces every facet with the snapshot's and reports what differed.
    pub fn apply(&mut self, info: &TopicInfo) -> FacetChanges {
        let mut changes = FacetChanges::default();
        if self.publishers != info.publishers {
            self.publishers = info.publishers.clone();
            changes.publishers = true;
        }
        if self.subscribers != info.subscribers {
            self.subscribers = info.subscribers.clone();
            changes.subscribers = true;
        }
        if self.type_name != info.type_name {
            self.type_name = info.type_name.clone();
            changes.type_name = true;
        }
        changes
    }
}
