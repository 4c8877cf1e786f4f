//! Shared application state

use sqlx::PgPool;

use crate::config::Config;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// PostgreSQL connection pool
    pub pool: PgPool,
    /// HTTP client for the Stripe API and the notification collaborator
    pub http: reqwest::Client,
    /// Stripe secret key (Transfer API)
    pub stripe_secret_key: String,
    /// Stripe webhook signing secret
    pub stripe_webhook_secret: String,
    /// Notification collaborator base URL, if configured
    pub notify_base_url: Option<String>,
}

impl AppState {
    /// Create a new AppState: connect the pool and run migrations.
    pub async fn new(config: &Config) -> Result<Self, BoxError> {
        let pool = PgPool::connect(&config.database_url).await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        Ok(Self {
            pool,
            http,
            stripe_secret_key: config.stripe_secret_key.clone(),
            stripe_webhook_secret: config.stripe_webhook_secret.clone(),
            notify_base_url: config.notify_base_url.clone(),
        })
    }
}
