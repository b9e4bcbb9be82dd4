//! OS process primitives
//!
//! The process list never talks to the operating system directly. It goes
//! through a [`ProcessBackend`], which creates children, answers non-blocking
//! exit queries and delivers termination signals.

#[cfg(any(test, feature = "testing"))]
pub mod scripted;
#[cfg(unix)]
pub mod unix;

use crate::core::ExitResult;
use serde::{Deserialize, Serialize};
use std::io;
use thiserror::Error;

#[cfg(any(test, feature = "testing"))]
pub use scripted::ScriptedBackend;
#[cfg(unix)]
pub use unix::UnixBackend;

#[cfg(unix)]
pub type DefaultBackend = UnixBackend;

/// Where launched children live with respect to process groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupMode {
    /// Children stay in the supervisor's process group; signals reach only the child.
    Inherit,
    /// Each child leads a new process group; signals reach the whole subtree.
    OwnGroup,
}

impl GroupMode {
    pub fn from_flag(own_group: bool) -> Self {
        if own_group {
            GroupMode::OwnGroup
        } else {
            GroupMode::Inherit
        }
    }
}

/// Termination signals, ordered from most to least cooperative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KillSignal {
    /// SIGTERM
    Terminate,
    /// SIGKILL
    Kill,
}

impl KillSignal {
    pub fn as_raw(self) -> i32 {
        match self {
            KillSignal::Terminate => 15,
            KillSignal::Kill => 9,
        }
    }
}

#[derive(Debug, Error)]
pub enum SpawnError {
    /// This particular command could not be started.
    #[error("{0}")]
    Launch(io::Error),
    /// The system is out of a resource needed for any spawn.
    #[error("out of resources: {0}")]
    Resources(io::Error),
}

#[derive(Debug, Error)]
pub enum SignalError {
    #[error("no such process")]
    NoSuchProcess,
    #[error("signal delivery failed: {0}")]
    Os(io::Error),
}

/// Process creation, exit-status source and signal delivery.
pub trait ProcessBackend {
    /// Start `argv` and return its pid without waiting for it.
    fn spawn(&mut self, argv: &[String], group: GroupMode) -> Result<u32, SpawnError>;

    /// Non-blocking exit query. `Ok(None)` means the child is still running.
    /// Once `Some` is returned for a pid the backend forgets it.
    fn try_wait(&mut self, pid: u32) -> io::Result<Option<ExitResult>>;

    /// Deliver `signal` to the child, or to its group under [`GroupMode::OwnGroup`].
    fn signal(&mut self, pid: u32, signal: KillSignal, group: GroupMode) -> Result<(), SignalError>;
}
