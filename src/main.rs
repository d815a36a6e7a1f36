//! gec-decode CLI entry point.
//!
//! ## Subcommands
//!
//! - `config show [--json]` - Effective configuration from the environment
//! - `config defaults` - Built-in defaults
//! - `config validate` - Validate configuration (exit 0/1)
//! - `config check FILE` - Validate a TOML decode config file
//! - `masks SOURCE TARGET` - Print attention masks for comma-separated ids

use std::path::Path;
use std::process::ExitCode;

use gec_decode::cli::{config_cmd, masks_cmd};
use gec_decode::config;
use gec_decode::telemetry;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(|s| s.as_str()).unwrap_or("help");

    let env = config::load();
    if let Err(e) = telemetry::init_logging(&env.log) {
        eprintln!("Logging disabled: {}", e);
    }

    match command {
        "config" => {
            let subcommand = args.get(2).map(|s| s.as_str()).unwrap_or("show");
            match subcommand {
                "show" => {
                    let json = args.get(3).map(|s| s.as_str()) == Some("--json");
                    ExitCode::from(config_cmd::run_show(json) as u8)
                }
                "defaults" => {
                    config_cmd::run_defaults();
                    ExitCode::SUCCESS
                }
                "validate" => ExitCode::from(config_cmd::run_validate() as u8),
                "check" => match args.get(3) {
                    Some(path) => ExitCode::from(config_cmd::run_check(Path::new(path)) as u8),
                    None => {
                        eprintln!("Usage: gec-decode-cli config check FILE");
                        ExitCode::from(2u8)
                    }
                },
                _ => {
                    eprintln!("Unknown config subcommand: {}", subcommand);
                    print_usage();
                    ExitCode::FAILURE
                }
            }
        }
        "masks" => match (args.get(2), args.get(3)) {
            (Some(source), Some(target)) => ExitCode::from(masks_cmd::run(source, target) as u8),
            _ => {
                eprintln!("Usage: gec-decode-cli masks SOURCE_IDS TARGET_IDS");
                ExitCode::from(2u8)
            }
        },
        "help" | "--help" | "-h" => {
            print_usage();
            ExitCode::SUCCESS
        }
        "version" | "--version" | "-V" => {
            println!("gec-decode {}", env!("CARGO_PKG_VERSION"));
            ExitCode::SUCCESS
        }
        _ => {
            eprintln!("Unknown command: {}", command);
            print_usage();
            ExitCode::FAILURE
        }
    }
}

fn print_usage() {
    let version = env!("CARGO_PKG_VERSION");
    eprintln!(
        "gec-decode v{}

USAGE:
    gec-decode-cli [COMMAND] [OPTIONS]

COMMANDS:
    config show [--json]   Show effective configuration
    config defaults        Show built-in defaults
    config validate        Validate configuration (exit 0 if valid)
    config check FILE      Validate a TOML decode config file
    masks SOURCE TARGET    Print attention masks, ids comma-separated
    version                Show version information
    help                   Show this help message

ENVIRONMENT:
    GEC_DECODE_BEAM_WIDTH      Beams tracked in parallel (default: 4)
    GEC_DECODE_MAX_STEPS       Max decode steps (default: 256)
    GEC_DECODE_LENGTH_PENALTY  Length penalty exponent (default: 0.6)
    GEC_DECODE_LM_WEIGHT       LM rerank weight (default: 0.0)
    GEC_DECODE_NORMALIZE       Normalize LM score by length (default: true)
    GEC_DECODE_TIMEOUT_MS      Per-request deadline (default: none)
    GEC_DECODE_LOG_FORMAT      json | pretty (default: json)
    GEC_DECODE_LOG_LEVEL       Log filter (default: info)

EXIT CODES:
    0  Success
    1  Failure / invalid configuration
    2  Usage error
",
        version
    );
}
