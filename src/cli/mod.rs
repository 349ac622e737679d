//! Command-line interface for vassal.

/// Command execution handlers.
pub mod commands;

use clap::{Parser, Subcommand};

/// Command-line interface for vassal.
#[derive(Parser)]
#[command(name = "vassal")]
#[command(author, version, about = "Local in-memory AWS SQS emulator", long_about = None)]
pub struct Cli {
    /// The command to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Start the vassal server.
    Start {
        /// HTTP port.
        #[arg(long, env = "VASSAL_PORT", default_value = "9324")]
        port: u16,

        /// Bind address (use 0.0.0.0 for all interfaces).
        #[arg(long, env = "VASSAL_BIND_IP", default_value = "127.0.0.1")]
        bind_ip: String,

        /// Base URL rendered into queue URLs (defaults to http://<bind_ip>:<port>).
        #[arg(long, env = "VASSAL_BASE_URL")]
        base_url: Option<String>,
    },
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
