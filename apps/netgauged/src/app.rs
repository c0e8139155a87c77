//! Runs the server until Ctrl-C or a fatal server error.

use anyhow::Context;
use netgauge_server::ThroughputServer;

use crate::config::Config;

pub async fn run(config: Config) -> anyhow::Result<()> {
    let server = ThroughputServer::new(config.server_config(), config.service());
    let server_run = std::sync::Arc::clone(&server);
    let mut serve = tokio::spawn(async move { server_run.run().await });

    tokio::select! {
        result = &mut serve => {
            // The server stopped on its own: bind failure or serve error.
            return result
                .context("server task panicked")?
                .context("throughput server failed");
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("SIGINT received, shutting down");
        }
    }

    server.shutdown();
    serve
        .await
        .context("server task panicked")?
        .context("throughput server failed")?;
    Ok(())
}
