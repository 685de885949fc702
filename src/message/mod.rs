//! Message synthesis.
//!
//! - `schema`: field types, resolved message schemas and the `TypeResolver`
//!   seam through which the registry turns a topic type name into a schema.
//! - `value`: concrete message instances handed to the transport.
//! - `fill`: builds a message instance from operator-supplied JSON arguments,
//!   applying named substitutions such as `now` and `auto`.

pub mod fill;
pub mod schema;
pub mod value;

pub use fill::{SubstitutionContext, fill_message, printable_args};
pub use schema::{FieldSpec, FieldType, MessageSchema, StaticTypeResolver, TypeDefinition, TypeResolver};
pub use value::{FieldValue, Header, Message, Stamp};
