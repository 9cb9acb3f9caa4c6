mod api;
mod app;
mod auth;
mod config;
mod db;
mod domain;
mod error;
mod logging;
mod middleware;
mod routes;
mod services;

use anyhow::Result;

use services::{realtime, ChangeHub, EmailClient, RedisCache};

/// Buffered change events per realtime subscriber before it lags
const CHANGE_FEED_CAPACITY: usize = 256;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let settings = config::Settings::from_env()?;

    // Initialize logging
    logging::init_logging(&settings.env);

    tracing::info!(
        env = ?settings.env,
        server_addr = %settings.server_addr,
        "Starting bid board backend"
    );

    // Create database pool
    let pool = db::create_pool(&settings).await?;
    if settings.run_migrations {
        db::run_migrations(&pool).await?;
    }

    // Redis is optional; the board works without it, just uncached
    let cache = match settings.redis_url.as_deref() {
        Some(url) => match RedisCache::new(url, settings.cache_ttl_seconds).await {
            Ok(cache) => Some(cache),
            Err(e) => {
                tracing::warn!(error = %e, "Redis unavailable - continuing without cache");
                None
            }
        },
        None => {
            tracing::info!("REDIS_URL not set - dashboard cache disabled");
            None
        }
    };

    let email = EmailClient::new(
        &settings.email_api_url,
        settings.email_api_key.clone(),
        &settings.email_from,
        settings.email_timeout_seconds,
    )?;

    let verifier = auth::TokenVerifier::new(
        &settings.token_verification,
        &settings.auth_issuer,
        &settings.auth_audience,
    )?;

    // Optionally warm the JWKS cache
    if let Err(e) = verifier.warm().await {
        tracing::warn!(error = %e, "Failed to warm JWKS cache - will fetch on first request");
    }

    // Change feed: LISTEN on Postgres, fan out to SSE subscribers
    let hub = ChangeHub::new(CHANGE_FEED_CAPACITY);
    let listener_task = realtime::spawn_listener(pool.clone(), hub.clone());

    // Create application state
    let state = app::AppState::new(pool, settings.clone(), verifier, cache, email, hub);

    // Build application
    let app = app::create_app(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&settings.server_addr).await?;
    tracing::info!("Listening on {}", settings.server_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    listener_task.abort();
    tracing::info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
