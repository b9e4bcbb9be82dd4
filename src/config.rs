//! Constants and the health-check file format

use crate::core::split_command;
use crate::error::{WardenError, WardenResult};
use crate::platform::GroupMode;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_ENV: &str = "PWARDEN_CONFIG";
pub const CONFIG_DIR_NAME: &str = "pwarden";
pub const CONFIG_FILE_NAME: &str = "checks.toml";

pub const DEFAULT_CAPACITY: usize = 32;
pub const DEFAULT_RUN_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);
pub const DEFAULT_KILL_TIMEOUT: Duration = Duration::from_secs(2);

// killall spreads its budget over this many escalation steps
pub const KILLALL_ATTEMPTS: u32 = 10;
pub const MIN_KILLALL_PAUSE: Duration = Duration::from_millis(1);

/// Which aggregate verdict ends a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum SummaryMode {
    /// Wait for every check before judging.
    #[default]
    Full,
    /// Stop at the first failed check.
    Short,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckConfig {
    pub name: String,
    pub command: String,
}

impl CheckConfig {
    /// Parse `NAME=COMMAND` as given on the command line.
    pub fn parse_inline(spec: &str) -> WardenResult<Self> {
        let (name, command) = spec.split_once('=').ok_or_else(|| {
            WardenError::config(format!("check '{}' must look like NAME=COMMAND", spec), None)
        })?;
        if name.trim().is_empty() {
            return Err(WardenError::config(format!("check '{}' has an empty name", spec), None));
        }
        Ok(Self {
            name: name.trim().to_string(),
            command: command.to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChecksConfig {
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    #[serde(default = "default_process_group")]
    pub process_group: bool,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_kill_timeout_ms")]
    pub kill_timeout_ms: u64,
    #[serde(default)]
    pub mode: SummaryMode,
    #[serde(default, rename = "check")]
    pub checks: Vec<CheckConfig>,
}

fn default_capacity() -> usize {
    DEFAULT_CAPACITY
}

fn default_process_group() -> bool {
    true
}

fn default_timeout_ms() -> u64 {
    DEFAULT_RUN_TIMEOUT.as_millis() as u64
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL.as_millis() as u64
}

fn default_kill_timeout_ms() -> u64 {
    DEFAULT_KILL_TIMEOUT.as_millis() as u64
}

impl Default for ChecksConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            process_group: default_process_group(),
            timeout_ms: default_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            kill_timeout_ms: default_kill_timeout_ms(),
            mode: SummaryMode::default(),
            checks: Vec::new(),
        }
    }
}

impl ChecksConfig {
    pub fn from_toml_str(content: &str) -> WardenResult<Self> {
        toml::from_str(content).map_err(|err| WardenError::config(err.to_string(), None))
    }

    pub fn load(path: &Path) -> WardenResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|err| WardenError::config(err.to_string(), Some(path.to_path_buf())))?;
        toml::from_str(&content)
            .map_err(|err| WardenError::config(err.to_string(), Some(path.to_path_buf())))
    }

    /// Check the limits and that every command splits.
    pub fn validate(&self) -> WardenResult<()> {
        if self.capacity == 0 {
            return Err(WardenError::config("capacity must be at least 1", None));
        }
        if self.checks.is_empty() {
            return Err(WardenError::config("no checks defined", None));
        }
        if self.checks.len() > self.capacity {
            return Err(WardenError::config(
                format!(
                    "{} checks defined but capacity is {}",
                    self.checks.len(),
                    self.capacity
                ),
                None,
            ));
        }
        if self.poll_interval_ms == 0 {
            return Err(WardenError::config("poll_interval_ms must be positive", None));
        }
        for check in &self.checks {
            split_command(&check.command)?;
        }
        Ok(())
    }

    pub fn group_mode(&self) -> GroupMode {
        GroupMode::from_flag(self.process_group)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn kill_timeout(&self) -> Duration {
        Duration::from_millis(self.kill_timeout_ms)
    }
}

/// Resolve the config file: explicit path, then `$PWARDEN_CONFIG`, then the user config dir.
pub fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    if let Some(path) = std::env::var_os(CONFIG_ENV).filter(|value| !value.is_empty()) {
        return Some(PathBuf::from(path));
    }
    dirs::config_dir()
        .map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
        .filter(|path| path.is_file())
}
