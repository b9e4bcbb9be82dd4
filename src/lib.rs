//! Process-Warden Library
//!
//! Bounded supervision of external commands: register a fixed number of
//! commands, launch them, reap their exits, fold the outcomes into a verdict
//! and reclaim hanging ones through escalating termination signals.

#[cfg(not(unix))]
compile_error!("process-warden supports Unix-like systems only");

pub mod commands;
pub mod config;
pub mod core;
pub mod error;
pub mod logging;
pub mod platform;
pub mod process_list;
pub mod runner;
pub mod signal;

// Re-export commonly used types for convenience
pub use crate::core::{
    split_command, EntryId, EntryState, ExitResult, NotifyReason, ProcessEntry, Verdict,
};
pub use error::{WardenError, WardenResult};
pub use platform::{GroupMode, KillSignal, ProcessBackend};
pub use process_list::{ProcessList, ProcessListOptions};
