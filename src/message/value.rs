use chrono::{DateTime, Utc};
use serde::ser::{Serialize, SerializeMap, Serializer};

/// A point in time (or a span) split into seconds and nanoseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct Stamp {
    pub secs: i64,
    pub nsecs: u32,
}

impl Stamp {
    pub fn from_datetime(at: DateTime<Utc>) -> Self {
        Self {
            secs: at.timestamp(),
            nsecs: at.timestamp_subsec_nanos(),
        }
    }

    /// Splits fractional seconds. Negative spans keep a non-negative `nsecs`.
    pub fn from_secs_f64(value: f64) -> Self {
        let secs = value.floor();
        let nsecs = ((value - secs) * 1e9).round().min(999_999_999.0) as u32;
        Self {
            secs: secs as i64,
            nsecs,
        }
    }
}

/// The standard message header.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct Header {
    pub seq: u32,
    pub stamp: Stamp,
    pub frame_id: String,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    String(String),
    Time(Stamp),
    Duration(Stamp),
    Header(Header),
    Array(Vec<FieldValue>),
    Message(Message),
}

/// A constructed message instance, fields in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub type_name: String,
    pub fields: Vec<(String, FieldValue)>,
}

impl Message {
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value)
    }
}

impl Serialize for Message {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}
