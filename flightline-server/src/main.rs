use anyhow::{anyhow, Context};
use flightline_server::Server;
use flightline_store::{app_config::Config, Repositories};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "flightline_server=debug,flightline_store=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!(
        "Starting flightline server on port {} ({:?})",
        config.server.port,
        config.invocation.semantics
    );

    let repos = Repositories::connect(&config.storage, &config.seed.flights)
        .await
        .map_err(|e| anyhow!("Failed to open storage: {}", e))?;

    let server = Server::bind(&config, repos)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr()))?;

    tokio::select! {
        _ = server.run() => {}
        result = tokio::signal::ctrl_c() => {
            result.context("Failed to listen for shutdown signal")?;
            tracing::info!("Shutting down");
        }
    }

    Ok(())
}
