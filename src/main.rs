use vassal::cli::{commands, Cli};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing; RUST_LOG overrides the default level.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse_args();
    commands::execute_command(cli.command).await?;

    Ok(())
}
