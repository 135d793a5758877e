//! Database fixtures for tests that need PostgreSQL
//!
//! Tests call [`test_pool`] first and return early when it yields `None`, so
//! the suite still passes on machines without `DATABASE_URL`. Every fixture
//! uses fresh ids and emails, so tests never depend on each other's rows.

use axum::{body::Body, http::Request, Router};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crosslearn::backend::auth::users::{create_user, User};
use crosslearn::backend::routes::create_router;
use crosslearn::backend::server::state::AppState;
use crosslearn::backend::teach::db as teach_db;
use crosslearn::shared::teach::NewTeachSession;
use crosslearn::shared::Role;

use super::test_config;

/// Connect to `DATABASE_URL` and run the migrations, or `None` when it is unset.
pub async fn test_pool() -> Option<PgPool> {
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set; skipping database test");
        return None;
    };
    let pool = PgPool::connect(&database_url)
        .await
        .expect("Failed to create test database pool");
    run_migrations(&pool).await.expect("Failed to run migrations");
    Some(pool)
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

/// Router and state backed by a real pool.
pub fn db_app(pool: &PgPool) -> (AppState, Router) {
    let state = AppState::new(test_config(), Some(pool.clone()));
    (state.clone(), create_router(state))
}

pub async fn create_test_user(pool: &PgPool, role: Role) -> User {
    let email = format!("test_{}@example.com", Uuid::new_v4());
    create_user(pool, "Test User", &email, "not-a-real-hash", role)
        .await
        .expect("Failed to create test user")
}

pub fn token_of(state: &AppState, user: &User) -> String {
    state.tokens.issue(user.id, &user.email).expect("token")
}

/// Give a student a completed teach session scored 90/90.
pub async fn qualify_for_peer_teaching(pool: &PgPool, student: &User) {
    let session = teach_db::create_session(
        pool,
        student.id,
        &NewTeachSession {
            title: "Practice".to_string(),
            topic: "Fractions".to_string(),
            reference_note_ids: Vec::new(),
            reference_assignment_ids: Vec::new(),
        },
    )
    .await
    .expect("teach session");
    sqlx::query(
        "UPDATE teach_sessions SET status = 'completed', clarity_score = 90, completeness_score = 90, \
         completed_at = NOW() WHERE id = $1",
    )
    .bind(session.id)
    .execute(pool)
    .await
    .expect("score teach session");
}

pub fn authed(method: &str, uri: &str, token: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", format!("Bearer {}", token));
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("request"),
        None => builder.body(Body::empty()).expect("request"),
    }
}
