// Copyright 2024-2026 Sonance Contributors
// SPDX-License-Identifier: Apache-2.0

//! CLI subcommands for the `sonance-core` binary.
//!
//! ```bash
//! sonance-core models list --json   # Registered models as JSON
//! sonance-core probe                # One free-memory reading
//! sonance-core generate --capability music --prompt "lofi" --out a.wav
//! sonance-core config validate      # Check SONANCE_* settings
//! ```

pub mod config_cmd;
pub mod generate_cmd;
pub mod models_cmd;
pub mod probe_cmd;

/// Value following `flag` at `args[i]`, or an error naming the flag.
pub(crate) fn flag_value<'a>(args: &'a [String], i: usize, flag: &str) -> Result<&'a str, String> {
    args.get(i + 1)
        .map(|s| s.as_str())
        .ok_or_else(|| format!("Missing value for {}", flag))
}
