use std::sync::Arc;

use sqlx::PgPool;

use crate::cancellations::variant::CoinSource;
use crate::config::Config;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Config,
    /// Coin-flip source behind variant assignment and the found-job flow
    /// decision. Production uses the OS RNG; tests inject a seeded source.
    pub coins: Arc<dyn CoinSource>,
}
