//! Integration tests for logging system

use async_trait::async_trait;
use bridge_traits::error::Result as SinkResult;
use bridge_traits::{LogEntry, LogLevel, LoggerSink};
use core_runtime::logging::{
    init_logging, redact_if_sensitive, strip_path, LogFormat, LoggingConfig,
};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct CollectingSink {
    entries: Mutex<Vec<LogEntry>>,
}

#[async_trait]
impl LoggerSink for CollectingSink {
    async fn log(&self, entry: LogEntry) -> SinkResult<()> {
        self.entries.lock().unwrap().push(entry);
        Ok(())
    }

    fn min_level(&self) -> LogLevel {
        LogLevel::Debug
    }
}

// The global subscriber can only be installed once per process, so every
// assertion about it lives in this single test.
#[test]
fn test_global_logging_initialization() {
    let sink = Arc::new(CollectingSink::default());
    let config = LoggingConfig::default()
        .with_format(LogFormat::Compact)
        .with_level(LogLevel::Debug)
        .with_filter("logging_integration=debug")
        .with_logger_sink(sink.clone());

    init_logging(config.clone()).expect("first initialization succeeds");

    tracing::debug!(play_token = "tkn-9", content_id = "SID0001", "resolving content");

    {
        let entries = sink.entries.lock().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].message, "resolving content");
        assert_eq!(
            entries[0].fields.get("play_token"),
            Some(&"[REDACTED]".to_string())
        );
    }

    assert!(init_logging(config).is_err());
}

#[test]
fn test_pii_redaction_tokens() {
    assert_eq!(redact_if_sensitive("play_token", "abc"), "[REDACTED]");
    assert_eq!(redact_if_sensitive("access_token", "abc"), "[REDACTED]");
    assert_eq!(redact_if_sensitive("password", "my_password"), "[REDACTED]");
}

#[test]
fn test_pii_redaction_normal_values() {
    assert_eq!(redact_if_sensitive("content_id", "SID0042"), "SID0042");
    assert_eq!(redact_if_sensitive("channel_id", "ch-7"), "ch-7");
    assert_eq!(redact_if_sensitive("generation", "3"), "3");
}

#[test]
fn test_path_stripping() {
    assert_eq!(strip_path("/var/mobile/Downloads/SID0042.movpkg"), "SID0042.movpkg");
    assert_eq!(strip_path("D:\\downloads\\SID0042.mp4"), "SID0042.mp4");
    assert_eq!(
        strip_path("https://cdn.example/hls/SID0042/master.m3u8?token=xyz"),
        "master.m3u8"
    );
    assert_eq!(strip_path(""), "");
}

#[test]
fn test_config_chaining() {
    let config = LoggingConfig::default()
        .with_format(LogFormat::Json)
        .with_level(LogLevel::Warn)
        .with_pii_redaction(false)
        .with_spans(false)
        .with_target(false)
        .with_thread_info(true);

    assert_eq!(config.format, LogFormat::Json);
    assert_eq!(config.level, LogLevel::Warn);
    assert!(!config.redact_pii);
    assert!(!config.enable_spans);
    assert!(!config.display_target);
    assert!(config.display_thread_info);
}
