pub mod admin;
pub mod appresult;
pub mod auth;
pub mod channels;
pub mod config;
pub mod db;
pub mod error;
pub mod matching;
pub mod profiles;

#[cfg(test)]
pub(crate) mod testing;

use axum::{extract::FromRef, routing::get, Router};
use sqlx::SqlitePool;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub use appresult::{AppError, AppResult};

use auth::Gate;
use channels::{ChannelRegistry, MessageLog, Relay};
use config::Config;
use matching::{Lifecycle, MatchStore};

#[derive(Clone, FromRef)]
pub struct AppState {
    pub db_pool: SqlitePool,
    pub gate: Gate,
    pub lifecycle: Lifecycle,
    pub registry: ChannelRegistry,
    pub relay: Relay,
}

impl AppState {
    /// Wire the services together over one pool.
    pub fn new(db_pool: SqlitePool, gate: Gate, config: Config) -> Self {
        let Config { matching, chat, .. } = config;
        let max_message_len = chat.max_message_len;

        let store = MatchStore::new(db_pool.clone(), matching);
        let log = MessageLog::new(db_pool.clone());
        let registry = ChannelRegistry::new(store.clone(), log.clone(), chat);
        let relay = Relay::new(registry.clone(), log, max_message_len);
        let lifecycle = Lifecycle::new(db_pool.clone(), store, registry.clone());

        Self {
            db_pool,
            gate,
            lifecycle,
            registry,
            relay,
        }
    }
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .merge(matching::router())
        .merge(channels::router())
        .merge(profiles::router())
        .nest("/admin", admin::router())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

async fn health() -> &'static str {
    "ok"
}
