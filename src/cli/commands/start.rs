//! Start command implementation.

use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;

use crate::config::VassalConfig;
use crate::core::store::QueueStore;
use crate::server::shutdown::{wait_for_signal, ShutdownSignal};
use crate::sqs::start_sqs_server;

/// Launch the emulator and serve until SIGINT/SIGTERM.
pub async fn execute(port: u16, bind_ip: String, base_url: Option<String>) -> Result<()> {
    info!("starting vassal");

    let mut config = VassalConfig::default();
    config.server.port = port;
    config.server.bind_ip = bind_ip;
    config.server.base_url = base_url;
    config
        .validate()
        .context("invalid server configuration")?;

    info!(
        bind_ip = %config.server.bind_ip,
        port = config.server.port,
        base_url = %config.server.base_url(),
        "configuration loaded"
    );

    let store = QueueStore::new();
    let shutdown_signal = ShutdownSignal::new();

    let server_store = store.clone();
    let server_config = config.clone();
    let server_rx = shutdown_signal.subscribe();
    let server_handle = tokio::spawn(async move {
        if let Err(e) = start_sqs_server(server_store, server_config, server_rx).await {
            tracing::error!("SQS HTTP server error: {}", e);
        }
    });

    wait_for_signal().await;
    shutdown_signal.shutdown();

    // Give the server a moment to drain in-flight requests.
    let _ = tokio::time::timeout(Duration::from_secs(10), server_handle).await;

    // Tear down all queues: cancels message timers, wakes blocked receives.
    store.shutdown().await;

    info!("shutdown complete");
    Ok(())
}
