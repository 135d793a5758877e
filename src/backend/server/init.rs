/**
 * Server Initialization
 *
 * Builds the application state, connects the optional database and wires the
 * router.
 *
 * # Initialization Process
 *
 * 1. Connect to the database named in the configuration (if any)
 * 2. Create the shared state: coordinator, LLM client, token keys
 * 3. Create the router
 * 4. Start the periodic sweep that drops dead sockets and empty rooms
 */

use std::time::Duration;

use axum::Router;

use crate::backend::routes::router::create_router;
use crate::backend::server::config::load_database;
use crate::backend::server::state::AppState;
use crate::shared::config::AppConfig;

/// How often closed sockets and empty rooms are swept
const SWEEP_INTERVAL: Duration = Duration::from_secs(300);

/// Create and configure the Axum application
///
/// The server stays up without a database or an LLM key; the affected routes
/// answer 503 or fall back to placeholders.
pub async fn create_app(config: AppConfig) -> Router<()> {
    tracing::info!("Initializing CrossLearn backend server");

    if config.uses_dev_secret() {
        tracing::warn!("JWT_SECRET_KEY not set; using the development secret");
    }
    if config.llm.api_key.is_none() {
        tracing::warn!("GEMINI_API_KEY not set; AI features will return placeholders");
    }

    let db_pool = load_database(config.database.url.as_deref()).await;
    let app_state = AppState::new(config, db_pool);

    let app = create_router(app_state.clone());

    let live = app_state.live.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            let closed = live.sweep().await;
            tracing::debug!("Live sweep removed {} closed connections", closed);
        }
    });

    tracing::info!("Router configured with periodic live sweep");

    app
}
