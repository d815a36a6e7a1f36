//! Decoder configuration loading from environment variables.
//!
//! All values are read from `GEC_DECODE_*` environment variables with
//! sensible defaults. Invalid values fall back to defaults without crashing.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |---|---|---|
//! | `GEC_DECODE_BEAM_WIDTH` | 4 | Beams tracked in parallel (1..=64) |
//! | `GEC_DECODE_MAX_STEPS` | 256 | Max decode steps per request |
//! | `GEC_DECODE_LENGTH_PENALTY` | 0.6 | Length penalty exponent (0 = off) |
//! | `GEC_DECODE_LM_WEIGHT` | 0.0 | LM rerank weight (0 = no rerank) |
//! | `GEC_DECODE_NORMALIZE` | true | Normalize LM score by beam length |
//! | `GEC_DECODE_TIMEOUT_MS` | unset | Per-request deadline |
//! | `GEC_DECODE_LOG_FORMAT` | json | `json` or `pretty` |
//! | `GEC_DECODE_LOG_LEVEL` | info | `EnvFilter` directive |

use serde::Serialize;

use crate::engine::{DecodeConfig, DecodeError};
use crate::telemetry::{LogConfig, LogFormat};

pub const MAX_BEAM_WIDTH: usize = 64;
pub const MAX_DECODE_STEPS: usize = 4096;

/// Effective configuration summary (serializable).
#[derive(Debug, Clone, Serialize)]
pub struct EffectiveConfig {
    pub beam_width: usize,
    pub max_decode_steps: usize,
    pub length_penalty_weight: f32,
    pub lm_weight: f32,
    pub normalize_by_length: bool,
    pub timeout_ms: Option<u64>,
    pub log_format: LogFormat,
    pub log_level: String,
}

/// All configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct EnvConfig {
    pub decode: DecodeConfig,
    pub log: LogConfig,
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse::<T>().ok())
}

fn parse_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(val) => match val.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => default,
        },
        Err(_) => default,
    }
}

fn load_decode_config() -> DecodeConfig {
    let defaults = DecodeConfig::default();
    let beam_width = parse_env::<usize>("GEC_DECODE_BEAM_WIDTH").unwrap_or(defaults.beam_width);
    let max_decode_steps = parse_env::<usize>("GEC_DECODE_MAX_STEPS").unwrap_or(defaults.max_decode_steps);
    let length_penalty_weight = parse_env::<f32>("GEC_DECODE_LENGTH_PENALTY")
        .filter(|w| w.is_finite() && *w >= 0.0)
        .unwrap_or(defaults.length_penalty_weight);
    let lm_weight = parse_env::<f32>("GEC_DECODE_LM_WEIGHT")
        .filter(|w| w.is_finite())
        .unwrap_or(defaults.lm_weight);
    let timeout_ms = parse_env::<u64>("GEC_DECODE_TIMEOUT_MS").filter(|ms| *ms > 0);

    DecodeConfig {
        beam_width: beam_width.clamp(1, MAX_BEAM_WIDTH),
        max_decode_steps: max_decode_steps.clamp(1, MAX_DECODE_STEPS),
        length_penalty_weight,
        lm_weight,
        normalize_by_length: parse_bool("GEC_DECODE_NORMALIZE", defaults.normalize_by_length),
        timeout_ms,
    }
}

fn load_log_config() -> LogConfig {
    let defaults = LogConfig::default();
    let format = parse_env::<LogFormat>("GEC_DECODE_LOG_FORMAT").unwrap_or(defaults.format);
    let level = std::env::var("GEC_DECODE_LOG_LEVEL")
        .ok()
        .filter(|l| !l.trim().is_empty())
        .unwrap_or(defaults.level);
    LogConfig { format, level, output_path: None }
}

/// Load all configuration from environment variables.
///
/// Missing or invalid values fall back to safe defaults without panicking.
pub fn load() -> EnvConfig {
    EnvConfig {
        decode: load_decode_config(),
        log: load_log_config(),
    }
}

/// Parse a decode configuration from TOML. Missing keys take defaults.
pub fn from_toml_str(source: &str) -> Result<DecodeConfig, DecodeError> {
    let config: DecodeConfig =
        toml::from_str(source).map_err(|e| DecodeError::Config(e.to_string()))?;
    config.validate()?;
    Ok(config)
}

impl EnvConfig {
    /// Return a serializable summary of all effective values.
    pub fn effective_config(&self) -> EffectiveConfig {
        EffectiveConfig {
            beam_width: self.decode.beam_width,
            max_decode_steps: self.decode.max_decode_steps,
            length_penalty_weight: self.decode.length_penalty_weight,
            lm_weight: self.decode.lm_weight,
            normalize_by_length: self.decode.normalize_by_length,
            timeout_ms: self.decode.timeout_ms,
            log_format: self.log.format,
            log_level: self.log.level.clone(),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    // Serialize env-mutating tests to avoid cross-test pollution.
    pub(crate) static ENV_LOCK: Mutex<()> = Mutex::new(());

    pub(crate) const ENV_KEYS: &[&str] = &[
        "GEC_DECODE_BEAM_WIDTH",
        "GEC_DECODE_MAX_STEPS",
        "GEC_DECODE_LENGTH_PENALTY",
        "GEC_DECODE_LM_WEIGHT",
        "GEC_DECODE_NORMALIZE",
        "GEC_DECODE_TIMEOUT_MS",
        "GEC_DECODE_LOG_FORMAT",
        "GEC_DECODE_LOG_LEVEL",
    ];

    pub(crate) fn clear_env_vars() {
        for k in ENV_KEYS {
            std::env::remove_var(k);
        }
    }

    #[test]
    fn test_defaults_are_sensible() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env_vars();
        let cfg = load();
        assert_eq!(cfg.decode, DecodeConfig::default());
        assert_eq!(cfg.log.format, LogFormat::Json);
        assert_eq!(cfg.log.level, "info");
        assert!(cfg.decode.validate().is_ok());
    }

    #[test]
    fn test_env_vars_override_defaults() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env_vars();
        std::env::set_var("GEC_DECODE_BEAM_WIDTH", "8");
        std::env::set_var("GEC_DECODE_MAX_STEPS", "50");
        std::env::set_var("GEC_DECODE_LENGTH_PENALTY", "0");
        std::env::set_var("GEC_DECODE_LM_WEIGHT", "0.3");
        std::env::set_var("GEC_DECODE_NORMALIZE", "false");
        std::env::set_var("GEC_DECODE_TIMEOUT_MS", "1500");
        std::env::set_var("GEC_DECODE_LOG_FORMAT", "pretty");
        let cfg = load();
        assert_eq!(cfg.decode.beam_width, 8);
        assert_eq!(cfg.decode.max_decode_steps, 50);
        assert_eq!(cfg.decode.length_penalty_weight, 0.0);
        assert_eq!(cfg.decode.lm_weight, 0.3);
        assert!(!cfg.decode.normalize_by_length);
        assert_eq!(cfg.decode.timeout_ms, Some(1500));
        assert_eq!(cfg.log.format, LogFormat::Pretty);
        clear_env_vars();
    }

    #[test]
    fn test_invalid_env_falls_back_to_default() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env_vars();
        std::env::set_var("GEC_DECODE_BEAM_WIDTH", "wide");
        std::env::set_var("GEC_DECODE_LENGTH_PENALTY", "-1");
        std::env::set_var("GEC_DECODE_NORMALIZE", "maybe");
        std::env::set_var("GEC_DECODE_TIMEOUT_MS", "0");
        std::env::set_var("GEC_DECODE_LOG_FORMAT", "xml");
        let cfg = load();
        assert_eq!(cfg.decode.beam_width, 4);
        assert_eq!(cfg.decode.length_penalty_weight, 0.6);
        assert!(cfg.decode.normalize_by_length);
        assert_eq!(cfg.decode.timeout_ms, None);
        assert_eq!(cfg.log.format, LogFormat::Json);
        clear_env_vars();
    }

    #[test]
    fn test_beam_width_and_steps_are_clamped() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env_vars();
        std::env::set_var("GEC_DECODE_BEAM_WIDTH", "0");
        std::env::set_var("GEC_DECODE_MAX_STEPS", "999999");
        let cfg = load();
        assert_eq!(cfg.decode.beam_width, 1);
        assert_eq!(cfg.decode.max_decode_steps, MAX_DECODE_STEPS);
        clear_env_vars();
    }

    #[test]
    fn test_toml_config_is_validated() {
        let cfg = from_toml_str("beam_width = 2\nmax_decode_steps = 10\n").unwrap();
        assert_eq!(cfg.beam_width, 2);
        assert_eq!(cfg.max_decode_steps, 10);
        assert!(matches!(from_toml_str("beam_width = 0"), Err(DecodeError::Config(_))));
        assert!(matches!(from_toml_str("beam_width = \"x\""), Err(DecodeError::Config(_))));
    }

    #[test]
    fn test_effective_config_serializes() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env_vars();
        let json = serde_json::to_value(load().effective_config()).unwrap();
        assert_eq!(json["beam_width"], 4);
        assert_eq!(json["log_format"], "json");
        assert!(json["timeout_ms"].is_null());
    }
}
