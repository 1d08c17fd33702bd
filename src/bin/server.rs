//! HTTP server binary for taskwise.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use taskwise::server::ChatServer;
use taskwise::{AssistantConfig, Orchestrator};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Conversational task-list assistant over HTTP.
#[derive(Parser)]
#[command(name = "taskwise-server", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to bind (overrides config and TASKWISE_HOST).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind (overrides config and TASKWISE_PORT).
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // a missing .env file is fine
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("taskwise=info,tower_http=info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = AssistantConfig::load(cli.config.as_deref())?;
    config.apply_env_overrides();
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    config.validate()?;

    let orchestrator = Arc::new(Orchestrator::new(config.build_context()?));
    info!(
        llm_model = %config.llm.model,
        embedding_model = %config.embedding.model,
        router_enabled = config.router.enabled,
        "taskwise starting"
    );

    let server = ChatServer::start(orchestrator, &config.server)
        .await
        .map_err(|e| {
            anyhow::anyhow!(
                "failed to bind {}:{}: {e}",
                config.server.host,
                config.server.port
            )
        })?;

    tokio::signal::ctrl_c().await?;
    info!("shutdown requested");
    server.shutdown().await;

    info!("taskwise shut down cleanly");
    Ok(())
}
