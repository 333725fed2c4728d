//! Integration tests for logging system

use bridge_traits::time::LogLevel;
use core_runtime::logging::{init_logging, strip_path, LogFormat, LoggingConfig};
use core_runtime::Error;

#[test]
fn test_logging_config_chaining() {
    let config = LoggingConfig::default()
        .with_format(LogFormat::Compact)
        .with_level(LogLevel::Warn)
        .with_spans(false)
        .with_target(false)
        .with_thread_info(true);

    assert_eq!(config.format, LogFormat::Compact);
    assert_eq!(config.level, LogLevel::Warn);
    assert!(!config.enable_spans);
    assert!(!config.display_target);
    assert!(config.display_thread_info);
    assert!(config.logger_sink.is_none());
}

#[test]
fn test_format_selection() {
    #[cfg(debug_assertions)]
    assert_eq!(LoggingConfig::default().format, LogFormat::Pretty);

    #[cfg(not(debug_assertions))]
    assert_eq!(LoggingConfig::default().format, LogFormat::Json);
}

#[test]
fn test_catalog_path_stripping() {
    assert_eq!(
        strip_path("/srv/books/Ursula K. Le Guin/The Dispossessed (41)"),
        "The Dispossessed (41)"
    );
    assert_eq!(
        strip_path("C:\\Users\\ana\\Calibre Library\\metadata.db"),
        "metadata.db"
    );
    assert_eq!(strip_path("tracking.db"), "tracking.db");
    assert_eq!(strip_path("/var/lib/bookshelf/"), "");
    assert_eq!(strip_path(""), "");
}

#[test]
fn test_invalid_filter_rejected() {
    let config = LoggingConfig::default().with_filter("core_sync=loudest");

    let err = init_logging(config).unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}

#[test]
fn test_init_only_once() {
    let config = LoggingConfig::default()
        .with_format(LogFormat::Json)
        .with_filter("core_sync=debug,sqlx=warn");

    assert!(init_logging(config.clone()).is_ok());
    assert!(init_logging(config).is_err());

    tracing::info!(target: "core_sync", run = "integration", "Logging initialized");
}
