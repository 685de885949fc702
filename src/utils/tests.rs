use super::error::{MessageConstructionError, RegistryError};
use super::logging;

#[test]
fn test_logging_init_accepts_levels() {
    // Should not panic
    logging::init("info");
    logging::init("debug");
    logging::init("warn");
}

#[test]
fn test_parse_level() {
    assert_eq!(logging::parse_level("WARNING"), tracing::Level::WARN);
    assert_eq!(logging::parse_level(" trace "), tracing::Level::TRACE);
    assert_eq!(logging::parse_level("bogus"), tracing::Level::INFO);
}

#[test]
fn test_error_messages_carry_field_detail() {
    let err = MessageConstructionError::TypeMismatch {
        field: "x".to_string(),
        expected: "int32".to_string(),
        found: "string".to_string(),
    };
    assert_eq!(err.to_string(), "field 'x': expected int32, got string");

    let err = RegistryError::UnknownTopic("/missing".to_string());
    assert_eq!(err.to_string(), "unknown topic: /missing");
}
