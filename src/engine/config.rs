//! Per-request decode configuration.
//!
//! All fields have safe defaults. Configuration is validated before the
//! decode loop starts and is immutable for the duration of one request.

use serde::{Deserialize, Serialize};

use super::error::DecodeError;

/// Caller-facing decode request configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodeConfig {
    /// Number of hypotheses tracked in parallel (1 = greedy).
    pub beam_width: usize,
    /// Hard cap on decode steps.
    pub max_decode_steps: usize,
    /// Length penalty exponent used for ranking (0.0 disables the penalty).
    pub length_penalty_weight: f32,
    /// Weight of the external LM score during reranking.
    pub lm_weight: f32,
    /// Divide the LM contribution by beam length during reranking.
    pub normalize_by_length: bool,
    /// Cancellation deadline in milliseconds, checked at step boundaries.
    pub timeout_ms: Option<u64>,
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self {
            beam_width: 4,
            max_decode_steps: 256,
            length_penalty_weight: 0.6,
            lm_weight: 0.0,
            normalize_by_length: true,
            timeout_ms: None,
        }
    }
}

impl DecodeConfig {
    /// Validate configuration values. Returns error on invalid values.
    pub fn validate(&self) -> Result<(), DecodeError> {
        if self.beam_width == 0 {
            return Err(DecodeError::Config("beam_width must be >= 1".into()));
        }
        if self.max_decode_steps == 0 {
            return Err(DecodeError::Config("max_decode_steps must be >= 1".into()));
        }
        if !self.length_penalty_weight.is_finite() || self.length_penalty_weight < 0.0 {
            return Err(DecodeError::Config(
                "length_penalty_weight must be finite and >= 0".into(),
            ));
        }
        if !self.lm_weight.is_finite() {
            return Err(DecodeError::Config("lm_weight must be finite".into()));
        }
        if self.timeout_ms == Some(0) {
            return Err(DecodeError::Config("timeout_ms must be > 0".into()));
        }
        Ok(())
    }

    /// Greedy decoding: a single beam with no length penalty.
    pub fn greedy(max_decode_steps: usize) -> Self {
        Self {
            beam_width: 1,
            max_decode_steps,
            length_penalty_weight: 0.0,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        assert!(DecodeConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_zero_beam_width() {
        let cfg = DecodeConfig { beam_width: 0, ..Default::default() };
        assert!(matches!(cfg.validate(), Err(DecodeError::Config(_))));
    }

    #[test]
    fn rejects_zero_steps() {
        let cfg = DecodeConfig { max_decode_steps: 0, ..Default::default() };
        assert!(matches!(cfg.validate(), Err(DecodeError::Config(_))));
    }

    #[test]
    fn rejects_negative_or_nan_penalty() {
        let cfg = DecodeConfig { length_penalty_weight: -0.5, ..Default::default() };
        assert!(cfg.validate().is_err());
        let cfg = DecodeConfig { length_penalty_weight: f32::NAN, ..Default::default() };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn greedy_has_single_beam() {
        let cfg = DecodeConfig::greedy(32);
        assert_eq!(cfg.beam_width, 1);
        assert_eq!(cfg.length_penalty_weight, 0.0);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let cfg: DecodeConfig = toml::from_str("beam_width = 8\nlm_weight = 0.5\n").unwrap();
        assert_eq!(cfg.beam_width, 8);
        assert_eq!(cfg.lm_weight, 0.5);
        assert_eq!(cfg.max_decode_steps, 256);
    }
}
