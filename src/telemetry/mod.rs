//! Telemetry: structured logging, decode spans and metrics.

mod logging;
mod metrics;
mod spans;

pub use logging::{init_logging, LogConfig, LogError, LogFormat};
pub use self::metrics::{record_decode_failure, record_decode_success, record_rerank};
pub use spans::{DecodeSpan, SpanExt};
