//! Tests for error display and classification

use aectl_config::ConfigError;
use std::path::PathBuf;

#[test]
fn test_file_not_found_display() {
    let err = ConfigError::FileNotFound(PathBuf::from("/some/path.yml"));
    assert_eq!(
        err.to_string(),
        "Configuration file not found: /some/path.yml"
    );
    assert!(err.is_not_found());
    assert!(!err.is_parse());
}

#[test]
fn test_not_discovered_display() {
    let err = ConfigError::NotDiscovered(".agent-engine.yml".to_string());
    assert!(err
        .to_string()
        .contains("Configuration file '.agent-engine.yml' not found"));
}

#[test]
fn test_missing_field_display() {
    let err = ConfigError::MissingField {
        profile: "default".to_string(),
        field: "display_name",
    };
    assert_eq!(
        err.to_string(),
        "display_name must be provided in profile 'default'"
    );
    assert!(!err.is_not_found());
}

#[test]
fn test_io_error_from() {
    let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "no permission");
    let err: ConfigError = io_err.into();
    assert!(matches!(err, ConfigError::Io(_)));
}

#[test]
fn test_error_send_sync() {
    fn check<T: Send + Sync + std::error::Error>() {}
    check::<ConfigError>();
}
