/**
 * Application State Management
 *
 * This module defines the application state structure and implements
 * the necessary `FromRef` traits for Axum state extraction.
 *
 * # Architecture
 *
 * The `AppState` struct is the central state container. It holds:
 * - The optional PostgreSQL pool
 * - The live session coordinator
 * - The LLM client
 * - Token signing keys and the loaded configuration
 *
 * # Thread Safety
 *
 * Every field is cheap to clone and safe to share: the pool and the HTTP
 * client are internally reference counted, the coordinator keeps its rooms
 * behind `Arc<RwLock<_>>`, and the configuration is an `Arc`.
 */

use std::sync::Arc;

use axum::extract::FromRef;
use sqlx::PgPool;

use crate::backend::ai::LlmClient;
use crate::backend::auth::sessions::TokenKeys;
use crate::backend::error::BackendError;
use crate::backend::live::LiveCoordinator;
use crate::shared::config::AppConfig;

/// Application state shared by every handler
///
/// # Usage
///
/// ```rust,ignore
/// use axum::extract::State;
/// use crosslearn::backend::server::state::AppState;
///
/// async fn handler(State(state): State<AppState>) {
///     let rooms = state.live.room_count().await;
/// }
/// ```
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    ///
    /// `None` when `DATABASE_URL` is not configured or the connection failed.
    /// Database-backed routes answer 503 in that case.
    pub db_pool: Option<PgPool>,

    /// Live session coordinator for the `/socket` endpoint
    pub live: LiveCoordinator,

    pub llm: LlmClient,

    pub tokens: TokenKeys,

    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(config: AppConfig, db_pool: Option<PgPool>) -> Self {
        Self {
            db_pool,
            live: LiveCoordinator::new(),
            llm: LlmClient::new(&config.llm),
            tokens: TokenKeys::new(&config.auth.jwt_secret, config.auth.token_ttl_days),
            config: Arc::new(config),
        }
    }

    /// The pool, or the 503 every database route returns without one.
    pub fn pool(&self) -> Result<&PgPool, BackendError> {
        self.db_pool.as_ref().ok_or_else(|| {
            tracing::error!("Database not configured");
            BackendError::database_unavailable()
        })
    }
}

impl FromRef<AppState> for Option<PgPool> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.db_pool.clone()
    }
}

impl FromRef<AppState> for LiveCoordinator {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.live.clone()
    }
}

impl FromRef<AppState> for LlmClient {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.llm.clone()
    }
}

impl FromRef<AppState> for TokenKeys {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.tokens.clone()
    }
}
