//! Command-line parsing

use crate::config::SummaryMode;
use clap::{Parser, Subcommand};
use std::ffi::OsString;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "pwarden",
    about = "Run a battery of check commands and report a pass/fail verdict",
    version
)]
pub struct Cli {
    /// Log filter (trace, debug, info, warn, error); defaults to RUST_LOG
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Also append logs to this file
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Run checks and exit with their verdict
    Run(RunArgs),

    /// Print the argument vector a command string splits into
    Parse {
        /// Command string, quoted as it would appear in a check definition
        command: String,
    },
}

#[derive(clap::Args, Debug, Clone, PartialEq, Eq)]
pub struct RunArgs {
    /// Checks file (TOML); falls back to $PWARDEN_CONFIG and the user config dir
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// Extra check given inline as NAME=COMMAND (repeatable)
    #[arg(long = "check", value_name = "NAME=COMMAND")]
    pub checks: Vec<String>,

    /// Overall time budget for the checks in milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Time budget for reclaiming hanging checks in milliseconds
    #[arg(long)]
    pub kill_timeout_ms: Option<u64>,

    /// Verdict that ends the run
    #[arg(long, value_enum)]
    pub mode: Option<SummaryMode>,

    /// Keep children in pwarden's own process group
    #[arg(long)]
    pub no_process_group: bool,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

impl Cli {
    /// Try to parse arguments (used by tests or custom argv)
    pub fn try_parse_from_args<I, T>(iter: I) -> Result<Cli, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        Cli::try_parse_from(iter)
    }
}
