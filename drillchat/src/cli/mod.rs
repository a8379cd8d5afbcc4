//! CLI argument parsing and command execution.

pub mod args;
mod commands;

pub use args::Cli;
pub use commands::execute;
