use dotenv::dotenv;
use salvo::prelude::*;
use tokio::signal;

use query_engine_backend::api;
use query_engine_backend::core::queries::IntegrationRegistry;
use query_engine_backend::utils::{AppState, Config};

/// Wait for shutdown signal (SIGTERM, SIGINT, or Ctrl+C)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install terminate handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal");
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("query_engine_backend=info".parse()?)
                .add_directive("salvo=info".parse()?)
                .add_directive("sea_orm=warn".parse()?)
                .add_directive("sqlx=warn".parse()?),
        )
        .init();

    let config = Config::from_env()?;
    tracing::info!(
        "Query timeout {}ms, dynamic variable TTL {}s, {} environment variables",
        config.query_timeout.as_millis(),
        config.variable_cache_ttl.as_secs(),
        config.environment_variables.len()
    );

    // Integrations are linked in by the embedding deployment
    let state = AppState::new(&config, IntegrationRegistry::new()).await?;
    let router = api::router(state);

    let acceptor = TcpListener::new(config.server_address.clone()).try_bind().await?;
    tracing::info!("Query engine backend listening on {}", config.server_address);

    let server = Server::new(acceptor);
    let handle = server.handle();

    tokio::spawn(async move {
        shutdown_signal().await;
        tracing::info!("Shutting down gracefully");
        handle.stop_graceful(None);
    });

    server.serve(Service::new(router)).await;
    Ok(())
}
