//! Command execution.

pub mod start;

use crate::cli::Commands;

/// Execute a parsed CLI command.
pub async fn execute_command(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Start {
            port,
            bind_ip,
            base_url,
        } => start::execute(port, bind_ip, base_url).await,
    }
}
