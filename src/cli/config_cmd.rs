//! Config CLI subcommands: show, defaults, validate, check.
//!
//! All but `check` read configuration straight from the environment.

use std::path::Path;

use crate::config::{self, EffectiveConfig};
use crate::engine::DecodeConfig;
use crate::telemetry::LogConfig;

/// Print effective config as key-value pairs (or JSON) to stdout.
pub fn run_show(json: bool) -> i32 {
    let cfg = config::load().effective_config();
    if json {
        match serde_json::to_string_pretty(&cfg) {
            Ok(text) => println!("{}", text),
            Err(e) => {
                eprintln!("Failed to serialize config: {}", e);
                return 1;
            }
        }
    } else {
        print_config(&cfg);
    }
    0
}

/// Print default config values (no env overrides) to stdout.
pub fn run_defaults() {
    let defaults = config::EnvConfig {
        decode: DecodeConfig::default(),
        log: LogConfig::default(),
    };
    print_config(&defaults.effective_config());
}

/// Validate configuration. Returns 0 if valid, 1 if anything looks wrong.
pub fn run_validate() -> i32 {
    let env = config::load();
    let mut warnings = 0;

    if let Err(e) = env.decode.validate() {
        eprintln!("ERROR: {}", e);
        warnings += 1;
    }
    if env.decode.lm_weight < 0.0 {
        eprintln!(
            "WARNING: GEC_DECODE_LM_WEIGHT ({}) is negative; the reranker will prefer text the LM dislikes",
            env.decode.lm_weight
        );
        warnings += 1;
    }
    if env.decode.length_penalty_weight > 2.0 {
        eprintln!(
            "WARNING: GEC_DECODE_LENGTH_PENALTY ({}) is unusually large; typical values are 0.6-1.0",
            env.decode.length_penalty_weight
        );
        warnings += 1;
    }

    if warnings == 0 {
        println!("Configuration is valid.");
        0
    } else {
        1
    }
}

/// Validate a TOML decode config file. Returns 0 if valid.
pub fn run_check(path: &Path) -> i32 {
    let source = match std::fs::read_to_string(path) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("ERROR: cannot read {}: {}", path.display(), e);
            return 1;
        }
    };
    match config::from_toml_str(&source) {
        Ok(cfg) => {
            println!(
                "{}: beam_width={} max_decode_steps={} lm_weight={}",
                path.display(),
                cfg.beam_width,
                cfg.max_decode_steps,
                cfg.lm_weight
            );
            0
        }
        Err(e) => {
            eprintln!("ERROR: {}", e);
            1
        }
    }
}

fn render_config(cfg: &EffectiveConfig) -> Vec<String> {
    vec![
        format!("GEC_DECODE_BEAM_WIDTH={}", cfg.beam_width),
        format!("GEC_DECODE_MAX_STEPS={}", cfg.max_decode_steps),
        format!("GEC_DECODE_LENGTH_PENALTY={}", cfg.length_penalty_weight),
        format!("GEC_DECODE_LM_WEIGHT={}", cfg.lm_weight),
        format!("GEC_DECODE_NORMALIZE={}", cfg.normalize_by_length),
        format!(
            "GEC_DECODE_TIMEOUT_MS={}",
            cfg.timeout_ms.map(|ms| ms.to_string()).unwrap_or_default()
        ),
        format!("GEC_DECODE_LOG_FORMAT={}", cfg.log_format.as_str()),
        format!("GEC_DECODE_LOG_LEVEL={}", cfg.log_level),
    ]
}

fn print_config(cfg: &EffectiveConfig) {
    for line in render_config(cfg) {
        println!("{}", line);
    }
}
