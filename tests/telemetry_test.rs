//! Telemetry tests: log config, decode spans and metric recording.

use gec_decode::telemetry::{
    record_decode_failure, record_decode_success, record_rerank, DecodeSpan, LogConfig, LogError,
    LogFormat, SpanExt,
};
use std::path::PathBuf;
use tracing::Span;

// =============================================================================
// LogConfig Tests
// =============================================================================

#[test]
fn log_config_default_is_json_to_stderr() {
    let config = LogConfig::default();
    assert_eq!(config.format, LogFormat::Json);
    assert_eq!(config.level, "info");
    assert!(config.output_path.is_none());
}

#[test]
fn log_config_with_output_path() {
    let config = LogConfig {
        format: LogFormat::Pretty,
        level: "gec_decode::engine=debug".to_string(),
        output_path: Some(PathBuf::from("/tmp/decode.log")),
    };
    assert_eq!(config.output_path, Some(PathBuf::from("/tmp/decode.log")));
}

#[test]
fn log_format_parses_aliases() {
    assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
    assert_eq!("text".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
    assert!(matches!("xml".parse::<LogFormat>(), Err(LogError::UnknownFormat(_))));
}

#[test]
fn log_error_display() {
    assert!(LogError::InvalidFilter("bad".into()).to_string().contains("Invalid log filter"));
    assert!(LogError::AlreadyInitialized.to_string().contains("already initialized"));
}

// =============================================================================
// Span Tests
// =============================================================================

#[test]
fn span_ext_record_result_ok_and_err() {
    let span = Span::none();
    span.record_result(&Ok::<u32, &str>(3));
    span.record_result(&Err::<u32, &str>("model step failed"));
}

#[test]
fn decode_span_accepts_completion_fields() {
    // Without a subscriber the span is disabled; recording must still be safe.
    let span = DecodeSpan::new("req-1", 4);
    let _guard = span.enter();
    span.record("steps", 12usize);
    span.record("finish_reason", "all_finished");
    span.record("latency_ms", 3u64);
}

// =============================================================================
// Metrics Tests
// =============================================================================

#[test]
fn metrics_without_recorder_are_noops() {
    record_decode_success("all_finished", 12, 40);
    record_decode_success("cancelled", 0, 0);
    record_decode_failure("model_step");
    record_rerank(4);
    record_rerank(0);
}
