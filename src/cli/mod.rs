//! Command line interface for Satchel indexes.

pub mod args;
pub mod commands;
pub mod output;

pub use args::*;
pub use commands::execute_command;
