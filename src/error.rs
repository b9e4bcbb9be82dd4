//! Unified error handling for process-warden
//!
//! Only structural failures are errors here. Per-entry problems (a command
//! that cannot be launched, a signal aimed at a process that already exited)
//! are folded into that entry's terminal state instead.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the library
#[derive(Error, Debug)]
pub enum WardenError {
    /// The command string does not follow the quoting grammar
    #[error("Invalid command '{command}': {reason}")]
    InvalidCommand { command: String, reason: String },

    /// Every slot of the process list is taken
    #[error("Process list is full (capacity {capacity})")]
    CapacityExceeded { capacity: usize },

    /// The exit-status query failed for a reason unrelated to the child
    #[error("Failed to query exit status of pid {pid}: {source}")]
    ReapQuery {
        pid: u32,
        #[source]
        source: io::Error,
    },

    /// Configuration file or option problems
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        path: Option<PathBuf>,
    },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Error categories
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Caller supplied something unusable
    Usage,
    /// The operating system refused an operation
    Runtime,
}

impl ErrorCategory {
    pub fn display_name(&self) -> &'static str {
        match self {
            ErrorCategory::Usage => "Usage",
            ErrorCategory::Runtime => "Runtime",
        }
    }
}

impl WardenError {
    pub(crate) fn invalid_command(command: &str, reason: impl Into<String>) -> Self {
        WardenError::InvalidCommand {
            command: command.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn config(message: impl Into<String>, path: Option<PathBuf>) -> Self {
        WardenError::Config {
            message: message.into(),
            path,
        }
    }

    /// Get error category
    pub fn category(&self) -> ErrorCategory {
        match self {
            WardenError::InvalidCommand { .. } => ErrorCategory::Usage,
            WardenError::CapacityExceeded { .. } => ErrorCategory::Usage,
            WardenError::Config { .. } => ErrorCategory::Usage,
            WardenError::ReapQuery { .. } => ErrorCategory::Runtime,
            WardenError::Io(_) => ErrorCategory::Runtime,
        }
    }

    /// Whether repeating the same call later can succeed
    pub fn is_recoverable(&self) -> bool {
        match self {
            WardenError::InvalidCommand { .. } => false,
            WardenError::Config { .. } => false,
            WardenError::CapacityExceeded { .. } => true,
            WardenError::ReapQuery { .. } => true,
            WardenError::Io(_) => true,
        }
    }

    /// Get user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            WardenError::InvalidCommand { command, reason } => {
                format!("Cannot parse command `{}`: {}", command, reason)
            }
            WardenError::CapacityExceeded { capacity } => format!(
                "No room for another command; at most {} may be tracked at once",
                capacity
            ),
            WardenError::ReapQuery { pid, source } => {
                format!("Lost track of process {}: {}", pid, source)
            }
            WardenError::Config {
                message,
                path: Some(path),
            } => format!("Configuration problem in {}: {}", path.display(), message),
            WardenError::Config { message, path: None } => {
                format!("Configuration problem: {}", message)
            }
            WardenError::Io(err) => format!("I/O failure: {}", err),
        }
    }
}

/// Result type alias for convenience
pub type WardenResult<T> = Result<T, WardenError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_categories() {
        let err = WardenError::invalid_command("echo \"", "unterminated double quote");
        assert_eq!(err.category(), ErrorCategory::Usage);
        assert!(!err.is_recoverable());

        let err = WardenError::CapacityExceeded { capacity: 3 };
        assert_eq!(err.category(), ErrorCategory::Usage);
        assert!(err.is_recoverable());

        let err = WardenError::ReapQuery {
            pid: 12,
            source: io::Error::from_raw_os_error(10),
        };
        assert_eq!(err.category(), ErrorCategory::Runtime);
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_error_messages() {
        let err = WardenError::config("no checks defined", Some(PathBuf::from("/etc/checks.toml")));
        let message = err.user_message();
        assert!(message.contains("/etc/checks.toml"));
        assert!(message.contains("no checks defined"));

        let err = WardenError::CapacityExceeded { capacity: 7 };
        assert!(err.to_string().contains('7'));
    }
}
