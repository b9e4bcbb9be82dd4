//! Data model for supervised commands
//!
//! Entries, their lifecycle state, exit classification and aggregate verdicts.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Handle to an entry of a [`ProcessList`](crate::process_list::ProcessList).
///
/// Carries the slot generation, so a handle to a removed entry never
/// resolves to whatever entry later reuses the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryId {
    pub(crate) slot: usize,
    pub(crate) generation: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryState {
    Initialized,
    Running,
    Finished,
}

impl fmt::Display for EntryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            EntryState::Initialized => "initialized",
            EntryState::Running => "running",
            EntryState::Finished => "finished",
        };
        f.write_str(label)
    }
}

/// How a finished entry ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExitResult {
    /// The process exited on its own; `code` is the raw exit status.
    Exited { code: i32 },
    /// The process was terminated by `signal`.
    Signaled { signal: i32 },
    /// The process could not be created at all.
    LaunchFailed { reason: String },
}

impl ExitResult {
    pub fn is_success(&self) -> bool {
        matches!(self, ExitResult::Exited { code: 0 })
    }

    /// Raw status: the exit code, the signal number, or -1 for launch failures.
    pub fn raw_status(&self) -> i32 {
        match self {
            ExitResult::Exited { code } => *code,
            ExitResult::Signaled { signal } => *signal,
            ExitResult::LaunchFailed { .. } => -1,
        }
    }
}

impl fmt::Display for ExitResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitResult::Exited { code: 0 } => f.write_str("success"),
            ExitResult::Exited { code } => write!(f, "failed with exit code {code}"),
            ExitResult::Signaled { signal } => write!(f, "killed by signal {signal}"),
            ExitResult::LaunchFailed { reason } => write!(f, "launch failed: {reason}"),
        }
    }
}

/// Why the notification callback fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyReason {
    /// The entry left `Initialized`, either running or with a launch failure.
    Executed,
    /// The entry reached `Finished`.
    Finished,
}

/// Aggregate outcome of a set of entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Success,
    Failure,
    Indeterminate,
}

impl Verdict {
    /// Integer form: 0 success, 1 failure, -1 indeterminate.
    pub fn as_code(self) -> i32 {
        match self {
            Verdict::Success => 0,
            Verdict::Failure => 1,
            Verdict::Indeterminate => -1,
        }
    }

    pub fn is_determinate(self) -> bool {
        self != Verdict::Indeterminate
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Verdict::Success => "success",
            Verdict::Failure => "failure",
            Verdict::Indeterminate => "indeterminate",
        };
        f.write_str(label)
    }
}

/// One registered command and its tracked lifecycle.
#[derive(Debug, Clone)]
pub struct ProcessEntry {
    id: EntryId,
    name: String,
    command: String,
    argv: Vec<String>,
    state: EntryState,
    pid: Option<u32>,
    exit_result: Option<ExitResult>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
}

impl ProcessEntry {
    pub(crate) fn new(id: EntryId, name: String, command: String, argv: Vec<String>) -> Self {
        Self {
            id,
            name,
            command,
            argv,
            state: EntryState::Initialized,
            pid: None,
            exit_result: None,
            started_at: None,
            finished_at: None,
        }
    }

    pub fn id(&self) -> EntryId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The command string exactly as registered.
    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    pub fn state(&self) -> EntryState {
        self.state
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn exit_result(&self) -> Option<&ExitResult> {
        self.exit_result.as_ref()
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    pub fn is_finished(&self) -> bool {
        self.state == EntryState::Finished
    }

    /// Finished with anything other than a zero exit.
    pub fn has_failed(&self) -> bool {
        self.exit_result
            .as_ref()
            .map(|result| !result.is_success())
            .unwrap_or(false)
    }

    /// Wall time between launch and finish, if both happened.
    pub fn duration(&self) -> Option<Duration> {
        match (self.started_at, self.finished_at) {
            (Some(started), Some(finished)) => Some(finished.signed_duration_since(started)),
            _ => None,
        }
    }

    pub(crate) fn mark_running(&mut self, pid: u32) {
        debug_assert_eq!(self.state, EntryState::Initialized);
        self.state = EntryState::Running;
        self.pid = Some(pid);
        self.started_at = Some(Utc::now());
    }

    pub(crate) fn mark_finished(&mut self, result: ExitResult) {
        debug_assert_ne!(self.state, EntryState::Finished);
        let now = Utc::now();
        self.state = EntryState::Finished;
        self.exit_result = Some(result);
        self.started_at.get_or_insert(now);
        self.finished_at = Some(now);
    }
}
