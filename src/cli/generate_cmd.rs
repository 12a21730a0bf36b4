// Copyright 2024-2026 Sonance Contributors
// SPDX-License-Identifier: Apache-2.0

//! Generate CLI subcommand: one job against an in-process runtime.

use std::path::PathBuf;

use super::flag_value;
use crate::config;
use crate::lifecycle::CapabilityPreference;
use crate::models::{Capability, GenerationRequest};
use crate::runner::{GenerationJob, ModelTarget};
use crate::{Runtime, RuntimeConfig};

/// Parsed `generate` arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateArgs {
    pub model: Option<String>,
    pub capability: Option<Capability>,
    pub commercial: bool,
    pub prompt: String,
    pub duration_secs: f32,
    pub out: PathBuf,
}

impl GenerateArgs {
    /// Parse everything after `generate`.
    pub fn parse(args: &[String]) -> Result<Self, String> {
        let mut model = None;
        let mut capability = None;
        let mut commercial = false;
        let mut prompt = String::new();
        let mut duration_secs = 10.0f32;
        let mut out = PathBuf::from("output.wav");

        let mut i = 0;
        while i < args.len() {
            match args[i].as_str() {
                "--model" => {
                    model = Some(flag_value(args, i, "--model")?.to_string());
                    i += 2;
                }
                "--capability" => {
                    let raw = flag_value(args, i, "--capability")?;
                    capability = Some(
                        raw.parse::<Capability>()
                            .map_err(|_| format!("Unknown capability: {}", raw))?,
                    );
                    i += 2;
                }
                "--prompt" => {
                    prompt = flag_value(args, i, "--prompt")?.to_string();
                    i += 2;
                }
                "--duration" => {
                    let raw = flag_value(args, i, "--duration")?;
                    duration_secs = raw
                        .parse()
                        .map_err(|_| format!("Invalid duration: {}", raw))?;
                    i += 2;
                }
                "--out" => {
                    out = PathBuf::from(flag_value(args, i, "--out")?);
                    i += 2;
                }
                "--commercial" => {
                    commercial = true;
                    i += 1;
                }
                other => return Err(format!("Unknown argument: {}", other)),
            }
        }

        if prompt.is_empty() {
            return Err("--prompt is required".to_string());
        }
        match (&model, &capability) {
            (Some(_), Some(_)) => Err("Use either --model or --capability, not both".to_string()),
            (None, None) => Err("One of --model or --capability is required".to_string()),
            _ => Ok(Self {
                model,
                capability,
                commercial,
                prompt,
                duration_secs,
                out,
            }),
        }
    }

    pub fn target(&self) -> ModelTarget {
        match (&self.model, self.capability) {
            (Some(id), _) => ModelTarget::Id(id.clone()),
            (None, Some(capability)) => ModelTarget::Capability {
                capability,
                prefs: CapabilityPreference {
                    prefer_loaded: true,
                    prefer_commercial: self.commercial,
                },
            },
            (None, None) => ModelTarget::capability(Capability::Music),
        }
    }
}

/// Run `generate`. Returns 0 on success, 1 on bad arguments or failed
/// generation, 3 when no model could be made available.
pub async fn run_generate(args: &[String]) -> i32 {
    let parsed = match GenerateArgs::parse(args) {
        Ok(parsed) => parsed,
        Err(e) => {
            eprintln!("{}", e);
            eprintln!(
                "Usage: sonance-core generate (--model <ID> | --capability <CAP> [--commercial]) --prompt <TEXT> [--duration SECS] [--out FILE]"
            );
            return 1;
        }
    };

    let env = config::load();
    let runtime = match Runtime::start(RuntimeConfig::from(&env)) {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 2;
        }
    };

    let request = GenerationRequest::new(&parsed.prompt, parsed.duration_secs, parsed.out.clone());
    let job = GenerationJob::new(parsed.target(), request);
    let code = match runtime.runner.run(job).await {
        Ok(outcome) => {
            println!(
                "{} -> {} ({:.1}s audio, {} ms)",
                outcome.model_id,
                outcome.output.output_path.display(),
                outcome.output.duration_secs,
                outcome.elapsed.as_millis()
            );
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            if e.is_retryable() {
                3
            } else {
                1
            }
        }
    };

    runtime.shutdown().await;
    code
}
