use crate::error::format::format_error_with_color;
use crate::error::*;
use chrono::{TimeZone, Utc};

fn held_error() -> BlockingError {
    BlockingError::BlockHeld {
        resource_id: "invoice-42".to_string(),
        held_since: Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap(),
    }
}

#[test]
fn test_error_context_block_held() {
    let error = held_error();
    let context = ErrorContext::new(&error);

    assert!(context.suggestion.unwrap().contains("expires or is released"));
    assert!(context.details.unwrap().contains("2025-01-02T03:04:05"));
}

#[test]
fn test_block_held_message_hides_owner() {
    let message = held_error().to_string();
    assert_eq!(message, "Resource 'invoice-42' is blocked by another owner");
}

#[test]
fn test_error_context_storage_filesystem() {
    let error = BlockingError::storage("filesystem", "doc-1", "permission denied");
    let context = ErrorContext::new(&error);

    assert!(context.suggestion.unwrap().contains("writable"));
    let details = context.details.unwrap();
    assert!(details.contains("doc-1"));
    assert!(details.contains("permission denied"));
}

#[test]
fn test_error_context_storage_key_value() {
    let error = BlockingError::storage("key_value", "doc-1", "connection refused");
    let context = ErrorContext::new(&error);
    assert!(context.suggestion.unwrap().contains("reachable"));
}

#[test]
fn test_error_context_acquire_conflict() {
    let error = BlockingError::AcquireConflict {
        resource_id: "doc-1".to_string(),
        attempts: 3,
    };
    let context = ErrorContext::new(&error);

    assert!(context.suggestion.unwrap().contains("Retry"));
    assert!(context.details.unwrap().contains("3 time(s)"));
}

#[test]
fn test_error_context_display() {
    let error = BlockingError::OwnerResolution("no session".to_string());
    let output = ErrorContext::new(&error).to_string();

    assert!(output.contains("Error:"));
    assert!(output.contains("Details:"));
    assert!(output.contains("Suggestion:"));
}

#[test]
fn test_is_contention() {
    assert!(held_error().is_contention());
    assert!(
        BlockingError::AcquireConflict {
            resource_id: "a".to_string(),
            attempts: 1
        }
        .is_contention()
    );
    assert!(!BlockingError::storage("in_memory", "a", "poisoned").is_contention());
}

#[test]
fn test_exit_codes() {
    assert_eq!(
        get_exit_code(&BlockingError::Configuration("bad".to_string())),
        2
    );
    assert_eq!(
        get_exit_code(&BlockingError::OwnerResolution("none".to_string())),
        3
    );
    assert_eq!(get_exit_code(&held_error()), 4);
    assert_eq!(
        get_exit_code(&BlockingError::AcquireConflict {
            resource_id: "a".to_string(),
            attempts: 3
        }),
        5
    );
    assert_eq!(
        get_exit_code(&BlockingError::NotHeld {
            resource_id: "a".to_string()
        }),
        6
    );
    assert_eq!(
        get_exit_code(&BlockingError::storage("filesystem", "a", "disk full")),
        20
    );
}

#[test]
fn test_format_error_chain() {
    let error = BlockingError::Configuration("Clock service is required.".to_string());
    let formatted = format_error_chain(&error);

    assert!(formatted.starts_with("Error: Configuration error: Clock service is required."));
    assert!(formatted.contains("Suggestion:"));
}

#[test]
fn test_format_error_with_color() {
    let error = held_error();

    let plain = format_error_with_color(&error, false);
    assert!(!plain.contains("\x1b["));
    assert!(plain.contains("• Another owner holds this resource"));

    let colored = format_error_with_color(&error, true);
    assert!(colored.contains("\x1b[31m"));
    assert!(colored.ends_with("\x1b[0m"));
}
