//! Core data model
//!
//! Command splitting and the per-entry record shared by the process list and its callers.

pub mod argv;
pub mod models;

pub use argv::split_command;
pub use models::{EntryId, EntryState, ExitResult, NotifyReason, ProcessEntry, Verdict};
