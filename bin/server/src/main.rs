use notiteams_connector::BotConnector;
use notiteams_reaper::Reaper;
use notiteams_registry::{PgRegistry, Registry};
use notiteams_server::{config::ServerConfig, router, shutdown::shutdown_signal};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,notiteams=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration from environment
    let config = ServerConfig::from_env().expect("failed to load configuration");
    tracing::info!("Loaded configuration");

    let registry = PgRegistry::connect(&config.database_url, &config.database)
        .await
        .expect("failed to connect to database");
    if config.database.run_migrations {
        registry.migrate().await.expect("failed to run migrations");
    }
    let registry: Arc<dyn Registry> = Arc::new(registry);

    if !config.connector.is_configured() {
        tracing::warn!("connector credentials are not set, message deletes will fail");
    }
    let transport =
        Arc::new(BotConnector::new(&config.connector).expect("invalid connector configuration"));

    let reaper = Arc::new(Reaper::new(
        Arc::clone(&registry),
        transport,
        config.reaper.clone(),
    ));
    let reaper_handle = reaper.start().expect("failed to start reaper");

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind to address");

    tracing::info!("listening on http://{}", addr);

    axum::serve(listener, router(Arc::clone(&registry)))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    // The reaper finishes its current sweep before the pool is closed.
    if let Err(e) = reaper_handle.stop().await {
        tracing::error!(error = %e, "reaper did not stop cleanly");
    }
    registry.shutdown().await;
    tracing::info!("shutdown complete");
}
