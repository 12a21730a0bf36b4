// Copyright 2024-2026 Sonance Contributors
// SPDX-License-Identifier: Apache-2.0

//! Sonance Core entry point.
//!
//! ## CLI Subcommands
//!
//! - `sonance-core` or `sonance-core serve` - Run the model manager until Ctrl+C
//! - `sonance-core models list [--json]` - Show registered models
//! - `sonance-core probe` - Read free accelerator memory
//! - `sonance-core generate ...` - Run one generation job
//! - `sonance-core config show|defaults|validate` - Inspect configuration

use std::process::ExitCode;

use sonance_core::cli::{config_cmd, generate_cmd, models_cmd, probe_cmd};
use sonance_core::config as sonance_config;
use sonance_core::telemetry::{self, LogConfig, LogFormat};
use sonance_core::{Runtime, RuntimeConfig};

#[tokio::main]
async fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(|s| s.as_str()).unwrap_or("serve");

    match command {
        "serve" | "" => {
            let env = sonance_config::load();
            if let Err(e) = telemetry::init_logging(&env.log) {
                eprintln!("Logging init failed: {}", e);
                return ExitCode::from(2u8);
            }
            match run_server(&env).await {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => {
                    eprintln!("Server error: {}", e);
                    ExitCode::FAILURE
                }
            }
        }
        "models" => {
            init_cli_logging();
            let subcommand = args.get(2).map(|s| s.as_str()).unwrap_or("list");
            match subcommand {
                "list" => {
                    let json = args.get(3).map(|s| s.as_str()) == Some("--json");
                    let code = models_cmd::run_list(json).await;
                    ExitCode::from(code as u8)
                }
                _ => {
                    eprintln!("Unknown models subcommand: {}", subcommand);
                    print_command_help("models");
                    ExitCode::FAILURE
                }
            }
        }
        "probe" => {
            init_cli_logging();
            let code = probe_cmd::run_probe().await;
            ExitCode::from(code as u8)
        }
        "generate" => {
            init_cli_logging();
            let code = generate_cmd::run_generate(&args[2..]).await;
            ExitCode::from(code as u8)
        }
        "config" => {
            let subcommand = args.get(2).map(|s| s.as_str()).unwrap_or("show");
            match subcommand {
                "show" => {
                    let json = args.get(3).map(|s| s.as_str()) == Some("--json");
                    config_cmd::run_show(json);
                    ExitCode::SUCCESS
                }
                "defaults" => {
                    config_cmd::run_defaults();
                    ExitCode::SUCCESS
                }
                "validate" => {
                    let code = config_cmd::run_validate();
                    ExitCode::from(code as u8)
                }
                _ => {
                    eprintln!("Unknown config subcommand: {}", subcommand);
                    print_command_help("config");
                    ExitCode::FAILURE
                }
            }
        }
        "help" | "--help" | "-h" => {
            if let Some(subcommand) = args.get(2) {
                print_command_help(subcommand);
            } else {
                print_usage();
            }
            ExitCode::SUCCESS
        }
        "version" | "--version" | "-V" => {
            println!("sonance-core {}", env!("CARGO_PKG_VERSION"));
            ExitCode::SUCCESS
        }
        _ => {
            eprintln!("Unknown command: {}", command);
            print_usage();
            ExitCode::FAILURE
        }
    }
}

/// One-shot commands log human-readable warnings only.
fn init_cli_logging() {
    let config = LogConfig {
        format: LogFormat::Pretty,
        level: std::env::var("SONANCE_LOG_LEVEL").unwrap_or_else(|_| "warn".to_string()),
        output_path: None,
    };
    let _ = telemetry::init_logging(&config);
}

fn print_usage() {
    let version = env!("CARGO_PKG_VERSION");
    eprintln!(
        "sonance-core - generative audio model lifecycle manager v{}

USAGE:
    sonance-core [COMMAND] [OPTIONS]

COMMANDS:
    serve        Run the model manager until Ctrl+C (default)
    models       Inspect registered models (list)
    probe        Read free accelerator memory
    generate     Run one generation job
    config       Inspect configuration (show, defaults, validate)
    version      Show version information
    help         Show this help message

EXAMPLES:
    sonance-core serve
    sonance-core models list --json
    sonance-core generate --capability music --prompt \"lofi beat\" --out beat.wav
    sonance-core config validate

ENVIRONMENT:
    SONANCE_PROBE        simulated (default) or device (nvidia-smi, CUDA)
    SONANCE_CATALOG      TOML model catalog merged over the builtin table
    SONANCE_LOG_FORMAT   json (default) or pretty
    SONANCE_LOG_LEVEL    EnvFilter directive (default: info)
    See `sonance-core config defaults` for every variable.

EXIT CODES:
    0  Success
    1  Failure
    2  Configuration error
    3  Model unavailable (retryable)
",
        version
    );
}

/// Print detailed help for a specific command.
fn print_command_help(command: &str) {
    match command {
        "serve" => eprintln!(
            "sonance-core serve - Run the model manager

USAGE:
    sonance-core serve

DESCRIPTION:
    Registers the builtin models and the optional SONANCE_CATALOG, starts
    the lifecycle manager and its idle reaper, and waits for Ctrl+C. On
    shutdown the manager stops accepting requests, stops the reaper and
    unloads every resident model, bounded by SONANCE_SHUTDOWN_TIMEOUT."
        ),
        "models" => eprintln!(
            "sonance-core models - Inspect registered models

USAGE:
    sonance-core models list [--json]"
        ),
        "probe" => eprintln!(
            "sonance-core probe - Read free accelerator memory

USAGE:
    sonance-core probe

DESCRIPTION:
    Queries nvidia-smi (and the CUDA driver when built with --features cuda)
    and prints each reading. Exits 1 when no source answers."
        ),
        "generate" => eprintln!(
            "sonance-core generate - Run one generation job

USAGE:
    sonance-core generate (--model <ID> | --capability <CAP> [--commercial])
                          --prompt <TEXT> [--duration SECS] [--out FILE]

CAPABILITIES:
    music, sfx, ambient, tts"
        ),
        "config" => eprintln!(
            "sonance-core config - Inspect configuration

USAGE:
    sonance-core config show [--json]
    sonance-core config defaults
    sonance-core config validate"
        ),
        _ => {
            eprintln!("No help available for: {}", command);
            print_usage();
        }
    }
}

async fn run_server(env: &sonance_config::EnvConfig) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = Runtime::start(RuntimeConfig::from(env))?;
    tracing::info!(
        models = runtime.registry.count(),
        enabled = runtime.registry.list_enabled().len(),
        gpu_gb = runtime.gpu.capacity_gb(),
        "sonance-core serving"
    );

    // Wait for Ctrl+C, then shut down in order.
    tokio::signal::ctrl_c().await?;
    eprintln!("Shutdown signal received, unloading models...");

    match tokio::time::timeout(env.shutdown_timeout, runtime.shutdown()).await {
        Ok(unloaded) => eprintln!("Shutdown complete, {} model(s) unloaded", unloaded),
        Err(_) => eprintln!(
            "Shutdown timeout after {}s, {} model(s) still resident",
            env.shutdown_timeout.as_secs(),
            runtime.manager.get_loaded_models().len()
        ),
    }

    Ok(())
}
