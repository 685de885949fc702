//! Message schemas and type resolution.
//!
//! A schema is resolved once, before a publish session starts, so that an
//! unknown type is reported to the operator synchronously. Nested message
//! types are resolved eagerly into the parent schema.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::Deserialize;

use crate::utils::error::ResolutionError;

#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
    String,
    Time,
    Duration,
    Header,
    Array {
        element: Box<FieldType>,
        len: Option<usize>,
    },
    Message(Arc<MessageSchema>),
}

impl FieldType {
    /// Parses a builtin type name. Returns `None` for message type names.
    pub fn primitive(name: &str) -> Option<Self> {
        let ty = match name {
            "bool" => FieldType::Bool,
            "int8" | "byte" => FieldType::Int8,
            "int16" => FieldType::Int16,
            "int32" => FieldType::Int32,
            "int64" => FieldType::Int64,
            "uint8" | "char" => FieldType::UInt8,
            "uint16" => FieldType::UInt16,
            "uint32" => FieldType::UInt32,
            "uint64" => FieldType::UInt64,
            "float32" => FieldType::Float32,
            "float64" => FieldType::Float64,
            "string" => FieldType::String,
            "time" => FieldType::Time,
            "duration" => FieldType::Duration,
            "Header" | "std_msgs/Header" => FieldType::Header,
            _ => return None,
        };
        Some(ty)
    }

    /// Inclusive integer bounds, `None` for non-integer types.
    pub fn int_bounds(&self) -> Option<(i128, i128)> {
        let bounds = match self {
            FieldType::Int8 => (i8::MIN as i128, i8::MAX as i128),
            FieldType::Int16 => (i16::MIN as i128, i16::MAX as i128),
            FieldType::Int32 => (i32::MIN as i128, i32::MAX as i128),
            FieldType::Int64 => (i64::MIN as i128, i64::MAX as i128),
            FieldType::UInt8 => (0, u8::MAX as i128),
            FieldType::UInt16 => (0, u16::MAX as i128),
            FieldType::UInt32 => (0, u32::MAX as i128),
            FieldType::UInt64 => (0, u64::MAX as i128),
            _ => return None,
        };
        Some(bounds)
    }

    pub fn is_signed_int(&self) -> bool {
        matches!(
            self,
            FieldType::Int8 | FieldType::Int16 | FieldType::Int32 | FieldType::Int64
        )
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldType::Bool => "bool",
            FieldType::Int8 => "int8",
            FieldType::Int16 => "int16",
            FieldType::Int32 => "int32",
            FieldType::Int64 => "int64",
            FieldType::UInt8 => "uint8",
            FieldType::UInt16 => "uint16",
            FieldType::UInt32 => "uint32",
            FieldType::UInt64 => "uint64",
            FieldType::Float32 => "float32",
            FieldType::Float64 => "float64",
            FieldType::String => "string",
            FieldType::Time => "time",
            FieldType::Duration => "duration",
            FieldType::Header => "Header",
            FieldType::Array { element, len } => {
                return match len {
                    Some(n) => write!(f, "{element}[{n}]"),
                    None => write!(f, "{element}[]"),
                };
            }
            FieldType::Message(schema) => &schema.type_name,
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub name: String,
    pub field_type: FieldType,
}

/// Field names and types of one message type, in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageSchema {
    pub type_name: String,
    pub fields: Vec<FieldSpec>,
}

impl MessageSchema {
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Human-readable definition, nested types indented below their field.
    pub fn definition_text(&self) -> String {
        let mut out = String::new();
        self.write_definition(&mut out, 0);
        out
    }

    fn write_definition(&self, out: &mut String, depth: usize) {
        for field in &self.fields {
            out.push_str(&"  ".repeat(depth));
            out.push_str(&format!("{} {}\n", field.field_type, field.name));
            let mut inner = &field.field_type;
            while let FieldType::Array { element, .. } = inner {
                inner = element;
            }
            if let FieldType::Message(nested) = inner {
                nested.write_definition(out, depth + 1);
            }
        }
    }
}

/// Resolves a type name to a message schema.
pub trait TypeResolver: Send + Sync {
    fn resolve(&self, type_name: &str) -> Result<MessageSchema, ResolutionError>;
}

/// A message type as written in configuration: one `"<type> <name>"` entry
/// per field.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TypeDefinition {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<String>,
}

/// Resolver backed by a fixed table of type definitions.
#[derive(Debug, Clone, Default)]
pub struct StaticTypeResolver {
    definitions: HashMap<String, Vec<String>>,
}

impl StaticTypeResolver {
    pub fn new(definitions: impl IntoIterator<Item = TypeDefinition>) -> Self {
        Self {
            definitions: definitions
                .into_iter()
                .map(|d| (d.name, d.fields))
                .collect(),
        }
    }

    pub fn register(&mut self, name: &str, fields: &[&str]) {
        self.definitions.insert(
            name.to_string(),
            fields.iter().map(|f| f.to_string()).collect(),
        );
    }

    fn resolve_inner(
        &self,
        type_name: &str,
        visiting: &mut Vec<String>,
    ) -> Result<MessageSchema, ResolutionError> {
        if visiting.iter().any(|v| v == type_name) {
            return Err(ResolutionError::Cycle(type_name.to_string()));
        }
        let lines = self
            .definitions
            .get(type_name)
            .ok_or_else(|| ResolutionError::UnknownType(type_name.to_string()))?;

        visiting.push(type_name.to_string());
        let mut fields = Vec::with_capacity(lines.len());
        for line in lines {
            let invalid = || ResolutionError::InvalidField {
                type_name: type_name.to_string(),
                definition: line.clone(),
            };
            let mut parts = line.split_whitespace();
            let (Some(ty), Some(name), None) = (parts.next(), parts.next(), parts.next()) else {
                return Err(invalid());
            };
            let field_type = self
                .parse_field_type(ty, type_name, visiting)?
                .ok_or_else(invalid)?;
            fields.push(FieldSpec {
                name: name.to_string(),
                field_type,
            });
        }
        visiting.pop();

        Ok(MessageSchema {
            type_name: type_name.to_string(),
            fields,
        })
    }

    /// `Ok(None)` means the type expression itself is malformed.
    fn parse_field_type(
        &self,
        expr: &str,
        owner: &str,
        visiting: &mut Vec<String>,
    ) -> Result<Option<FieldType>, ResolutionError> {
        if let Some(stripped) = expr.strip_suffix(']') {
            let Some((element, len)) = stripped.rsplit_once('[') else {
                return Ok(None);
            };
            let len = if len.is_empty() {
                None
            } else {
                match len.parse::<usize>() {
                    Ok(n) => Some(n),
                    Err(_) => return Ok(None),
                }
            };
            return Ok(self
                .parse_field_type(element, owner, visiting)?
                .map(|element| FieldType::Array {
                    element: Box::new(element),
                    len,
                }));
        }
        if let Some(primitive) = FieldType::primitive(expr) {
            return Ok(Some(primitive));
        }
        // Unqualified names refer to the owner's package first.
        let qualified = match (expr.contains('/'), owner.split_once('/')) {
            (false, Some((package, _))) => {
                let candidate = format!("{package}/{expr}");
                if self.definitions.contains_key(&candidate) {
                    candidate
                } else {
                    expr.to_string()
                }
            }
            _ => expr.to_string(),
        };
        let nested = self.resolve_inner(&qualified, visiting)?;
        Ok(Some(FieldType::Message(Arc::new(nested))))
    }
}

impl TypeResolver for StaticTypeResolver {
    fn resolve(&self, type_name: &str) -> Result<MessageSchema, ResolutionError> {
        self.resolve_inner(type_name, &mut Vec::new())
    }
}
