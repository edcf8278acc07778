//! CLI module
//!
//! Provides command-line access to a store directory:
//! - init: create the store and its first journal segment
//! - inspect: recover and summarize the store
//! - read: print one committed state
//! - remove: delete one committed state

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{init, inspect, read, remove, run, run_command};
pub use errors::{CliError, CliResult};
pub use io::write_response;
