mod app;

use anyhow::{Context, Result};
use std::{
    fs::{self, OpenOptions},
    path::Path,
    sync::{Arc, Mutex},
};

use games_core::{
    config::{self, AppConfig},
    ApiClient, CatalogSource, GameStore,
};
use tracing_subscriber::{prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    config::ensure_default_config()?;
    let config = AppConfig::load()?;
    init_logging(&config.log_dir)?;

    tracing::info!(
        environment = ?config.environment,
        api = config.api_root_url(),
        database = %config.database_path.display(),
        "Starting games client"
    );

    let store = GameStore::open(&config.database_path).with_context(|| {
        format!(
            "failed to open local store {}",
            config.database_path.display()
        )
    })?;
    let client: Arc<dyn CatalogSource> = Arc::new(ApiClient::from_config(&config)?);

    let mut app = app::GamesApp::new(client, store, &config);
    app.run().await
}

fn init_logging(log_dir: &Path) -> Result<()> {
    fs::create_dir_all(log_dir)
        .with_context(|| format!("failed to create log directory {}", log_dir.display()))?;
    let log_path = log_dir.join("games.log");
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("failed to open log file {}", log_path.display()))?;

    let env_filter = EnvFilter::from_default_env();

    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .compact()
        .with_writer(std::io::stdout);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_ansi(false)
        .compact()
        .with_writer(Mutex::new(log_file));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    Ok(())
}
