//! bazaar-cloud — marketplace payment core
//!
//! Request-driven service that:
//! - Ingests payment-processor webhooks (signature-verified, deduplicated)
//! - Drives order state transitions (pending → paid → refunded / canceled)
//! - Maintains the append-only seller balance ledger
//! - Orchestrates seller transfers after an order is paid

mod api;
mod config;
mod db;
mod error;
mod notify;
mod payouts;
mod refund;
mod state;
mod stripe;

use config::Config;
use state::AppState;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    // Load .env file
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bazaar_cloud=info,tower_http=info".into()),
        )
        .init();

    let config = Config::from_env()?;

    tracing::info!("Starting bazaar-cloud (env: {})", config.environment);

    let state = AppState::new(&config).await?;

    let app = api::create_router(state);

    let http_addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&http_addr).await?;
    tracing::info!("bazaar-cloud HTTP listening on {http_addr}");

    axum::serve(listener, app).await?;

    Ok(())
}
