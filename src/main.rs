// src/main.rs

use barberia_api::{app, config::Config, db, AppState};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment from .env if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,tower_http=info,sqlx=warn")),
        )
        .init();

    let config = Config::from_env()?;

    let pool = db::connect(&config).await?;
    if config.run_migrations {
        db::migrate(&pool).await?;
    }
    let state = AppState::new(pool, &config);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(%addr, slot_minutes = config.slot_minutes, "API listening");

    axum::serve(listener, app(state).into_make_service()).await?;
    Ok(())
}
