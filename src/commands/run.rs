//! `pwarden run`

use super::parser::RunArgs;
use crate::config::{resolve_config_path, CheckConfig, ChecksConfig};
use crate::core::Verdict;
use crate::error::{WardenError, WardenResult};
use crate::logging::debug;
use crate::runner::{self, RunReport};
use std::future::Future;
use std::process::ExitCode;

pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_INDETERMINATE: u8 = 2;
pub const EXIT_USAGE: u8 = 64;
pub const EXIT_RUNTIME: u8 = 70;

/// Merge the checks file (if any) with command-line checks and overrides.
pub fn build_config(args: &RunArgs) -> WardenResult<ChecksConfig> {
    let mut config = match resolve_config_path(args.config.as_deref()) {
        Some(path) => {
            debug(format!("loading checks from {}", path.display()));
            ChecksConfig::load(&path)?
        }
        None if args.checks.is_empty() => {
            return Err(WardenError::config(
                "no checks file found and no --check given",
                None,
            ));
        }
        None => ChecksConfig::default(),
    };

    for spec in &args.checks {
        config.checks.push(CheckConfig::parse_inline(spec)?);
    }
    if let Some(timeout_ms) = args.timeout_ms {
        config.timeout_ms = timeout_ms;
    }
    if let Some(kill_timeout_ms) = args.kill_timeout_ms {
        config.kill_timeout_ms = kill_timeout_ms;
    }
    if let Some(mode) = args.mode {
        config.mode = mode;
    }
    if args.no_process_group {
        config.process_group = false;
    }

    config.validate()?;
    Ok(config)
}

pub async fn execute<S>(args: &RunArgs, shutdown: S) -> WardenResult<RunReport>
where
    S: Future<Output = ()>,
{
    let config = build_config(args)?;
    runner::run_checks(&config, shutdown).await
}

pub fn exit_code(verdict: Verdict) -> ExitCode {
    match verdict {
        Verdict::Success => ExitCode::SUCCESS,
        Verdict::Failure => ExitCode::from(EXIT_FAILURE),
        Verdict::Indeterminate => ExitCode::from(EXIT_INDETERMINATE),
    }
}
