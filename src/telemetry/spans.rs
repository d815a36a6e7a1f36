//! Span helpers for decode requests.

use tracing::{info_span, Span};

/// Extension trait for recording an operation's result on a span.
pub trait SpanExt {
    fn record_result<T, E>(&self, result: &Result<T, E>)
    where
        E: std::fmt::Display;
}

impl SpanExt for Span {
    fn record_result<T, E>(&self, result: &Result<T, E>)
    where
        E: std::fmt::Display,
    {
        match result {
            Ok(_) => {
                self.record("status", "ok");
            }
            Err(e) => {
                self.record("status", "error");
                self.record("error.message", e.to_string().as_str());
            }
        }
    }
}

/// Factory for the per-request decode span.
pub struct DecodeSpan;

impl DecodeSpan {
    /// Fields left empty here are filled in when the request completes:
    /// `status`, `error.message`, `steps`, `finish_reason`, `latency_ms`.
    pub fn new(request_id: &str, beam_width: usize) -> Span {
        info_span!(
            "decode_request",
            request_id = %request_id,
            beam_width = beam_width,
            status = tracing::field::Empty,
            error.message = tracing::field::Empty,
            steps = tracing::field::Empty,
            finish_reason = tracing::field::Empty,
            latency_ms = tracing::field::Empty,
        )
    }
}
