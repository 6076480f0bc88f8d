//! CLI argument definitions using clap
//!
//! Commands:
//! - timetravel init --config <path>
//! - timetravel start --config <path>
//! - timetravel migrate --config <path>
//! - timetravel history --id <id> --config <path>

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// timetravel - a versioned record store with time travel
#[derive(Parser, Debug)]
#[command(name = "timetravel")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Initialize a new data directory
    Init {
        /// Path to configuration file
        #[arg(long, default_value = "./timetravel.json")]
        config: PathBuf,
    },

    /// Start the HTTP server
    Start {
        /// Path to configuration file
        #[arg(long, default_value = "./timetravel.json")]
        config: PathBuf,
    },

    /// Import legacy records and print what was migrated
    Migrate {
        /// Path to configuration file
        #[arg(long, default_value = "./timetravel.json")]
        config: PathBuf,
    },

    /// Print every version of a record
    History {
        /// Record id
        #[arg(long)]
        id: i64,

        /// Path to configuration file
        #[arg(long, default_value = "./timetravel.json")]
        config: PathBuf,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
