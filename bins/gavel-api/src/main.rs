mod handlers;
mod routes;

use anyhow::{Context, Result};
use axum::Router;
use gavel_common::config::ServiceConfig;
use gavel_engine::{Judge, JudgeConfig};
use redis::aio::ConnectionManager;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::info;

pub struct AppState {
    pub redis: ConnectionManager,
    pub judge: Judge,
    pub result_ttl: Duration,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
        )
        .with_target(false)
        .init();

    info!("Gavel API booting...");

    let service = ServiceConfig::from_env();
    let judge_config = JudgeConfig::load_default().context("Failed to load judge configuration")?;
    info!(languages = ?judge_config.list_languages(), "Judge configuration loaded");

    let client = redis::Client::open(service.redis_url.as_str())
        .context("Failed to create Redis client")?;
    let redis_conn = ConnectionManager::new(client).await
        .context("Failed to connect to Redis")?;

    info!("Connected to Redis: {}", service.redis_url);

    let state = Arc::new(AppState {
        redis: redis_conn,
        judge: Judge::new(judge_config),
        result_ttl: service.result_ttl,
    });

    let app = Router::new()
        .merge(routes::routes())
        .with_state(state);

    let listener = TcpListener::bind(&service.api_addr).await
        .with_context(|| format!("Failed to bind to {}", service.api_addr))?;

    info!("HTTP server listening on {}", service.api_addr);

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
