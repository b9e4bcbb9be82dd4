//! Health-check runner
//!
//! Drives a [`ProcessList`] from an async loop: launch every check, poll for
//! exits on a fixed interval, stop once the configured verdict is known (or
//! the budget runs out, or shutdown is requested) and reclaim whatever is
//! still running through the kill path.

use crate::config::{ChecksConfig, SummaryMode};
use crate::core::{EntryState, ExitResult, NotifyReason, ProcessEntry, Verdict};
use crate::error::{WardenError, WardenResult};
use crate::logging::{debug, info, warn};
use crate::platform::ProcessBackend;
use crate::process_list::{ProcessList, ProcessListOptions};
use serde::Serialize;
use std::future::Future;
use std::io;
use std::time::{Duration, Instant};
use tokio::time::MissedTickBehavior;

/// Outcome of one check as seen when the run stopped.
#[derive(Debug, Clone, Serialize)]
pub struct CheckReport {
    pub name: String,
    pub command: String,
    pub pid: Option<u32>,
    pub state: EntryState,
    pub result: Option<ExitResult>,
    pub duration_ms: Option<i64>,
}

impl CheckReport {
    fn from_entry(entry: &ProcessEntry) -> Self {
        Self {
            name: entry.name().to_string(),
            command: entry.command().to_string(),
            pid: entry.pid(),
            state: entry.state(),
            result: entry.exit_result().cloned(),
            duration_ms: entry.duration().map(|duration| duration.num_milliseconds()),
        }
    }

    fn status_icon(&self) -> &'static str {
        match &self.result {
            Some(result) if result.is_success() => "✓",
            Some(_) => "✗",
            None => "…",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub verdict: Verdict,
    pub mode: SummaryMode,
    pub timed_out: bool,
    pub interrupted: bool,
    pub elapsed_ms: u64,
    pub checks: Vec<CheckReport>,
    /// Entries that survived the kill path.
    pub unreclaimed: usize,
}

impl RunReport {
    pub fn print(&self) {
        println!("=== Health Check Report ===");
        for check in &self.checks {
            let outcome = match (&check.result, check.state) {
                (Some(result), _) => result.to_string(),
                (None, EntryState::Running) => "still running, killed".to_string(),
                (None, _) => "not started".to_string(),
            };
            let duration = check
                .duration_ms
                .map(|ms| format!("{:.1}s", ms as f64 / 1000.0))
                .unwrap_or_else(|| "-".to_string());
            println!("{} {} - {} ({})", check.status_icon(), check.name, outcome, duration);
        }

        if self.timed_out {
            println!("Timed out after {:.1}s", self.elapsed_ms as f64 / 1000.0);
        }
        if self.interrupted {
            println!("Interrupted");
        }
        if self.unreclaimed > 0 {
            println!("{} processes could not be reclaimed", self.unreclaimed);
        }
        println!("Result: {}", self.verdict);
    }

    pub fn to_json(&self) -> WardenResult<String> {
        serde_json::to_string_pretty(self).map_err(|err| WardenError::Io(err.into()))
    }
}

/// Run the checks of `config` against real processes.
pub async fn run_checks<S>(config: &ChecksConfig, shutdown: S) -> WardenResult<RunReport>
where
    S: Future<Output = ()>,
{
    config.validate()?;
    let list = ProcessList::new(ProcessListOptions::new(config.capacity, config.group_mode()));
    run_with_list(list, config, shutdown).await
}

/// Run the checks of `config` on an already constructed list.
pub async fn run_with_list<B, S>(
    list: ProcessList<B>,
    config: &ChecksConfig,
    shutdown: S,
) -> WardenResult<RunReport>
where
    B: ProcessBackend + Send + 'static,
    S: Future<Output = ()>,
{
    let mut list = list.with_notify(|reason, entry| match reason {
        NotifyReason::Executed => debug(format!("check '{}' executed", entry.name())),
        NotifyReason::Finished => info(format!(
            "check '{}' finished: {}",
            entry.name(),
            entry
                .exit_result()
                .map(ToString::to_string)
                .unwrap_or_default()
        )),
    });

    for check in &config.checks {
        list.register(&check.name, &check.command)?;
    }

    let started = Instant::now();
    if let Err(err) = list.launch_all_initialized() {
        warn(format!("launching checks failed: {}", err));
        let unreclaimed = reclaim(list, config.kill_timeout()).await?;
        if unreclaimed > 0 {
            warn(format!("{} started checks could not be reclaimed", unreclaimed));
        }
        return Err(err);
    }

    let verdict_of = |list: &ProcessList<B>| match config.mode {
        SummaryMode::Full => list.summary_result(),
        SummaryMode::Short => list.summary_result_short(),
    };

    let mut interval = tokio::time::interval(config.poll_interval());
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let deadline = tokio::time::sleep(config.timeout());
    tokio::pin!(deadline);
    tokio::pin!(shutdown);

    let mut timed_out = false;
    let mut interrupted = false;
    let mut verdict = verdict_of(&list);
    while !verdict.is_determinate() {
        tokio::select! {
            _ = interval.tick() => {
                // Failed exit queries are retried on the next tick.
                if let Err(err) = list.reap_available() {
                    warn(format!("exit query failed: {}", err));
                }
                verdict = verdict_of(&list);
            }
            _ = &mut deadline => {
                warn(format!("checks did not settle within {:?}", config.timeout()));
                timed_out = true;
                break;
            }
            _ = &mut shutdown => {
                warn("shutdown requested, stopping checks");
                interrupted = true;
                break;
            }
        }
    }

    let checks: Vec<CheckReport> = list.entries().map(CheckReport::from_entry).collect();
    let unreclaimed = reclaim(list, config.kill_timeout()).await?;

    Ok(RunReport {
        verdict,
        mode: config.mode,
        timed_out,
        interrupted,
        elapsed_ms: started.elapsed().as_millis() as u64,
        checks,
        unreclaimed,
    })
}

/// `killall` sleeps between escalation steps, so it runs off the async workers.
async fn reclaim<B>(mut list: ProcessList<B>, timeout: Duration) -> WardenResult<usize>
where
    B: ProcessBackend + Send + 'static,
{
    tokio::task::spawn_blocking(move || list.killall(timeout))
        .await
        .map_err(|err| WardenError::Io(io::Error::other(err)))
}
