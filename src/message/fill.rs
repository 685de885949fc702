//! Builds message instances from JSON field arguments.
//!
//! Arguments are either an object keyed by field name (missing fields take
//! the type default) or an array of positional values. A lone scalar is
//! treated as a one-element positional list.
//!
//! A string argument naming an entry of the `SubstitutionContext` is replaced
//! by that entry when its value fits the field type. The default context
//! provides `now` (current time) and `auto` (a header stamped with the
//! current time).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde_json::Value;

use super::schema::{FieldType, MessageSchema};
use super::value::{FieldValue, Header, Message, Stamp};
use crate::utils::error::MessageConstructionError;

/// Named values that field arguments may refer to.
#[derive(Debug, Clone, Default)]
pub struct SubstitutionContext {
    values: HashMap<String, FieldValue>,
}

impl SubstitutionContext {
    /// The standard `now` / `auto` substitutions for the given instant.
    pub fn at(now: DateTime<Utc>) -> Self {
        let stamp = Stamp::from_datetime(now);
        let mut ctx = Self::default();
        ctx.insert("now", FieldValue::Time(stamp));
        ctx.insert(
            "auto",
            FieldValue::Header(Header {
                stamp,
                ..Header::default()
            }),
        );
        ctx
    }

    pub fn current() -> Self {
        Self::at(Utc::now())
    }

    pub fn insert(&mut self, key: &str, value: FieldValue) {
        self.values.insert(key.to_string(), value);
    }

    /// The substitution for `key` if one exists and fits `field_type`.
    pub fn resolve(&self, key: &str, field_type: &FieldType) -> Option<FieldValue> {
        let value = self.values.get(key)?;
        let fits = matches!(
            (value, field_type),
            (FieldValue::Time(_), FieldType::Time)
                | (FieldValue::Duration(_), FieldType::Duration)
                | (FieldValue::Header(_), FieldType::Header)
                | (FieldValue::String(_), FieldType::String)
                | (FieldValue::Bool(_), FieldType::Bool)
        );
        fits.then(|| value.clone())
    }
}

/// Compact listing of the arguments, used in error reports.
pub fn printable_args(args: &Value) -> String {
    match args {
        Value::Array(items) => items
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(", "),
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| format!("{k}: {v}"))
            .collect::<Vec<_>>()
            .join(", "),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Builds one instance of `schema` from `args`.
pub fn fill_message(
    schema: &MessageSchema,
    args: &Value,
    ctx: &SubstitutionContext,
) -> Result<Message, MessageConstructionError> {
    fill_fields(schema, args, ctx, "")
}

fn fill_fields(
    schema: &MessageSchema,
    args: &Value,
    ctx: &SubstitutionContext,
    prefix: &str,
) -> Result<Message, MessageConstructionError> {
    let path = |name: &str| {
        if prefix.is_empty() {
            name.to_string()
        } else {
            format!("{prefix}.{name}")
        }
    };

    let mut fields = Vec::with_capacity(schema.fields.len());
    match args {
        Value::Null => {
            for spec in &schema.fields {
                fields.push((spec.name.clone(), default_value(&spec.field_type)));
            }
        }
        Value::Object(map) => {
            if let Some(unknown) = map.keys().find(|k| schema.field(k).is_none()) {
                return Err(MessageConstructionError::UnknownField {
                    field: path(unknown),
                    type_name: schema.type_name.clone(),
                });
            }
            for spec in &schema.fields {
                let value = match map.get(&spec.name) {
                    Some(raw) => fill_value(&spec.field_type, raw, ctx, &path(&spec.name))?,
                    None => default_value(&spec.field_type),
                };
                fields.push((spec.name.clone(), value));
            }
        }
        Value::Array(items) => {
            if items.len() != schema.fields.len() {
                return Err(MessageConstructionError::ArgumentCount {
                    type_name: schema.type_name.clone(),
                    expected: schema.fields.len(),
                    found: items.len(),
                });
            }
            for (spec, raw) in schema.fields.iter().zip(items) {
                let value = fill_value(&spec.field_type, raw, ctx, &path(&spec.name))?;
                fields.push((spec.name.clone(), value));
            }
        }
        scalar => {
            return fill_fields(schema, &Value::Array(vec![scalar.clone()]), ctx, prefix);
        }
    }

    Ok(Message {
        type_name: schema.type_name.clone(),
        fields,
    })
}

fn fill_value(
    field_type: &FieldType,
    raw: &Value,
    ctx: &SubstitutionContext,
    path: &str,
) -> Result<FieldValue, MessageConstructionError> {
    if let Value::String(key) = raw {
        if let Some(substituted) = ctx.resolve(key, field_type) {
            return Ok(substituted);
        }
    }

    let mismatch = || MessageConstructionError::TypeMismatch {
        field: path.to_string(),
        expected: field_type.to_string(),
        found: describe(raw),
    };

    match field_type {
        FieldType::Bool => raw.as_bool().map(FieldValue::Bool).ok_or_else(mismatch),
        FieldType::Float32 | FieldType::Float64 => {
            let v = raw.as_f64().ok_or_else(mismatch)?;
            if matches!(field_type, FieldType::Float32) && v.abs() > f32::MAX as f64 {
                return Err(out_of_range(path, raw, field_type));
            }
            Ok(FieldValue::Float(v))
        }
        FieldType::String => raw
            .as_str()
            .map(|s| FieldValue::String(s.to_string()))
            .ok_or_else(mismatch),
        FieldType::Time => stamp_from(raw).map(FieldValue::Time).ok_or_else(mismatch),
        FieldType::Duration => stamp_from(raw).map(FieldValue::Duration).ok_or_else(mismatch),
        FieldType::Header => header_from(raw, ctx, path).map(FieldValue::Header),
        FieldType::Array { element, len } => {
            let items = raw.as_array().ok_or_else(mismatch)?;
            if len.is_some_and(|n| n != items.len()) {
                return Err(mismatch());
            }
            items
                .iter()
                .enumerate()
                .map(|(i, item)| fill_value(element, item, ctx, &format!("{path}[{i}]")))
                .collect::<Result<Vec<_>, _>>()
                .map(FieldValue::Array)
        }
        FieldType::Message(schema) => fill_fields(schema, raw, ctx, path).map(FieldValue::Message),
        int_type => {
            let (min, max) = int_type.int_bounds().ok_or_else(mismatch)?;
            let v = raw
                .as_i64()
                .map(i128::from)
                .or_else(|| raw.as_u64().map(i128::from))
                .ok_or_else(mismatch)?;
            if v < min || v > max {
                return Err(out_of_range(path, raw, int_type));
            }
            Ok(if int_type.is_signed_int() {
                FieldValue::Int(v as i64)
            } else {
                FieldValue::UInt(v as u64)
            })
        }
    }
}

fn header_from(
    raw: &Value,
    ctx: &SubstitutionContext,
    path: &str,
) -> Result<Header, MessageConstructionError> {
    let Value::Object(map) = raw else {
        return Err(MessageConstructionError::TypeMismatch {
            field: path.to_string(),
            expected: "Header".to_string(),
            found: describe(raw),
        });
    };
    let mut header = Header::default();
    for (key, value) in map {
        let field = format!("{path}.{key}");
        match (key.as_str(), fill_value_for_header(key, value, ctx, &field)?) {
            ("seq", FieldValue::UInt(seq)) => header.seq = seq as u32,
            ("stamp", FieldValue::Time(stamp)) => header.stamp = stamp,
            ("frame_id", FieldValue::String(frame)) => header.frame_id = frame,
            _ => {
                return Err(MessageConstructionError::UnknownField {
                    field,
                    type_name: "Header".to_string(),
                });
            }
        }
    }
    Ok(header)
}

fn fill_value_for_header(
    key: &str,
    value: &Value,
    ctx: &SubstitutionContext,
    path: &str,
) -> Result<FieldValue, MessageConstructionError> {
    let field_type = match key {
        "seq" => FieldType::UInt32,
        "stamp" => FieldType::Time,
        "frame_id" => FieldType::String,
        _ => {
            return Err(MessageConstructionError::UnknownField {
                field: path.to_string(),
                type_name: "Header".to_string(),
            });
        }
    };
    fill_value(&field_type, value, ctx, path)
}

/// Seconds as a number, or `{ "secs": .., "nsecs": .. }`.
fn stamp_from(raw: &Value) -> Option<Stamp> {
    match raw {
        Value::Number(n) => n.as_f64().map(Stamp::from_secs_f64),
        Value::Object(map) => {
            let secs = map.get("secs").map_or(Some(0), Value::as_i64)?;
            let nsecs = map.get("nsecs").map_or(Some(0), Value::as_u64)?;
            (nsecs < 1_000_000_000).then_some(Stamp {
                secs,
                nsecs: nsecs as u32,
            })
        }
        _ => None,
    }
}

fn default_value(field_type: &FieldType) -> FieldValue {
    match field_type {
        FieldType::Bool => FieldValue::Bool(false),
        FieldType::Int8 | FieldType::Int16 | FieldType::Int32 | FieldType::Int64 => {
            FieldValue::Int(0)
        }
        FieldType::UInt8 | FieldType::UInt16 | FieldType::UInt32 | FieldType::UInt64 => {
            FieldValue::UInt(0)
        }
        FieldType::Float32 | FieldType::Float64 => FieldValue::Float(0.0),
        FieldType::String => FieldValue::String(String::new()),
        FieldType::Time => FieldValue::Time(Stamp::default()),
        FieldType::Duration => FieldValue::Duration(Stamp::default()),
        FieldType::Header => FieldValue::Header(Header::default()),
        FieldType::Array { element, len } => {
            FieldValue::Array(vec![default_value(element); len.unwrap_or(0)])
        }
        FieldType::Message(schema) => FieldValue::Message(Message {
            type_name: schema.type_name.clone(),
            fields: schema
                .fields
                .iter()
                .map(|f| (f.name.clone(), default_value(&f.field_type)))
                .collect(),
        }),
    }
}

fn out_of_range(path: &str, raw: &Value, field_type: &FieldType) -> MessageConstructionError {
    MessageConstructionError::OutOfRange {
        field: path.to_string(),
        value: raw.to_string(),
        field_type: field_type.to_string(),
    }
}

fn describe(raw: &Value) -> String {
    match raw {
        Value::Null => "null".to_string(),
        Value::Bool(_) => "bool".to_string(),
        Value::Number(n) if n.is_f64() => "float".to_string(),
        Value::Number(_) => "integer".to_string(),
        Value::String(s) => format!("string \"{s}\""),
        Value::Array(items) => format!("array of {}", items.len()),
        Value::Object(_) => "object".to_string(),
    }
}
