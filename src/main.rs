use clap::Parser;
use std::net::SocketAddr;
use tracing_subscriber::EnvFilter;

use trackweave::config::{Cli, Config};
use trackweave::db;
use trackweave::routes::build_router;
use trackweave::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Parse CLI args and load config
    let cli = Cli::parse();
    let data_dir = Config::data_dir(&cli);
    std::fs::create_dir_all(&data_dir)?;
    tracing::info!("Data directory: {}", data_dir.display());

    let config = Config::load(&cli)?;
    if config.auth.uses_dev_secret() {
        tracing::warn!(
            "Using the built-in development secret key; set TRACKWEAVE_SECRET_KEY or auth.secret_key"
        );
    }

    // Initialize database
    let db_path = config.db_path();
    let pool = db::create_pool_with(&db_path, &config.database)?;
    db::run_migrations(&pool)?;
    tracing::info!("Database: {}", db_path.display());

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let app = build_router(AppState::new(pool, config));

    // Start server
    tracing::info!("Listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
