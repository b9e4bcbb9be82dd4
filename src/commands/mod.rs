//! CLI command handling

pub mod parser;
pub mod run;

pub use parser::{Cli, Commands, RunArgs};
