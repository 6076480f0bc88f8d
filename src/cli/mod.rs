//! CLI module for timetravel
//!
//! Provides command-line interface for:
//! - init: Create the data directory and an empty version log
//! - start: Recover, migrate and serve HTTP
//! - migrate: Import legacy records and report
//! - history: Print a record's versions

mod args;
mod commands;
mod config;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{history, init, migrate, run, run_command, start};
pub use config::Config;
pub use errors::{CliError, CliResult};
