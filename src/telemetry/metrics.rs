//! Decode metrics on top of the `metrics` facade.
//!
//! No recorder is installed by this crate; without one these calls are no-ops.

use metrics::{counter, histogram};

pub fn record_decode_success(finish_reason: &'static str, steps: usize, latency_ms: u64) {
    counter!("gec_decode_requests_total", "outcome" => finish_reason).increment(1);
    histogram!("gec_decode_steps").record(steps as f64);
    histogram!("gec_decode_latency_ms").record(latency_ms as f64);
}

pub fn record_decode_failure(kind: &'static str) {
    counter!("gec_decode_failures_total", "kind" => kind).increment(1);
}

pub fn record_rerank(candidates: usize) {
    counter!("gec_decode_reranks_total").increment(1);
    histogram!("gec_decode_rerank_candidates").record(candidates as f64);
}
