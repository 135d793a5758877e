/**
 * Peer Session Handlers
 *
 * REST side of peer learning. A student whose best teach session scores at
 * least 80% opens a session; other students enroll, chat, draw and rate it.
 * The lifecycle rules live in `shared::peer`; these handlers load the row,
 * apply the rule and persist the result.
 *
 * Enroll, start, end, rate and delete run inside one transaction holding
 * the session row lock, so concurrent requests see each other's writes in
 * order. State changes are pushed to the live room after commit.
 *
 * # Routes
 *
 * - `POST /api/peer-learning/sessions` - open a session
 * - `GET /api/peer-learning/sessions` - waiting/active sessions, `status`/`skip`/`limit`
 * - `GET /api/peer-learning/sessions/my-teachings` - sessions the caller teaches
 * - `GET /api/peer-learning/sessions/{id}` - one session
 * - `POST /api/peer-learning/sessions/{id}/enroll|start|end` - lifecycle
 * - `GET /api/peer-learning/sessions/{id}/messages`, `POST .../chat` - chat history
 * - `POST /api/peer-learning/sessions/{id}/rate` - rate (enrolled students)
 * - `GET /api/peer-learning/stats` - the caller's teaching stats
 * - `DELETE /api/peer-learning/sessions/{id}` - delete a waiting session (teacher)
 * - `POST|GET /api/peer-learning/sessions/{id}/whiteboard` - save / list snapshots
 */

use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::backend::auth::users::{add_coins, lock_coins, set_coins};
use crate::backend::error::{ApiResult, BackendError};
use crate::backend::middleware::AuthUser;
use crate::backend::peer::db::{self, PeerMessage, PeerRating};
use crate::backend::server::state::AppState;
use crate::backend::teach::db::completed_scores;
use crate::shared::error::SharedError;
use crate::shared::peer::{
    best_teach_score, validate_rating, NewPeerSession, PeerSession, RatingSummary, SessionStatus, TeachingStats,
};
use crate::shared::teach::{default_message_type, NewWhiteboardSnapshot, WhiteboardSnapshot};

#[derive(Debug, Deserialize)]
pub struct SessionFilter {
    #[serde(default)]
    pub status: Option<SessionStatus>,
    #[serde(default)]
    pub skip: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    20
}

/// A session with its teacher's name and enrollment count
#[derive(Debug, Serialize)]
pub struct PeerSessionView {
    #[serde(flatten)]
    pub session: PeerSession,
    pub teacher_name: Option<String>,
    pub enrolled_count: usize,
}

impl PeerSessionView {
    pub fn new(session: PeerSession, teacher_name: Option<String>) -> Self {
        Self {
            enrolled_count: session.enrolled_count(),
            session,
            teacher_name,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct EnrollResponse {
    pub message: &'static str,
    pub peer_session_id: Uuid,
    pub student_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct StartResponse {
    pub message: &'static str,
    pub session_id: Uuid,
    pub status: SessionStatus,
    pub enrolled_count: usize,
}

#[derive(Debug, Serialize)]
pub struct EndResponse {
    pub message: &'static str,
    pub session_id: Uuid,
    pub status: SessionStatus,
    pub students_taught: usize,
    pub coins_earned: i32,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct NewPeerMessage {
    pub content: String,
    #[serde(default = "default_message_type")]
    pub message_type: String,
    #[serde(default)]
    pub audio_duration: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct RatingRequest {
    pub rating: i32,
    #[serde(default)]
    pub feedback: Option<String>,
    #[serde(default)]
    pub upvoted: bool,
}

fn session_not_found() -> BackendError {
    BackendError::not_found("Peer session not found")
}

async fn load_session(pool: &PgPool, session_id: Uuid) -> ApiResult<PeerSession> {
    db::get_session(pool, session_id).await?.ok_or_else(session_not_found)
}

pub async fn create_session(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(request): Json<NewPeerSession>,
) -> ApiResult<Json<PeerSessionView>> {
    let pool = state.pool()?;
    let best = best_teach_score(completed_scores(pool, user.user_id).await?);

    let session = PeerSession::open(user.user_id, &request, best, Utc::now()).map_err(|e| {
        tracing::warn!("Peer session rejected for {}: {}", user.user_id, e);
        BackendError::from(e)
    })?;
    let session = db::insert_session(pool, &session).await?;

    tracing::info!("Peer session {} opened by {} (best score {:.1})", session.id, user.user_id, best);
    Ok(Json(PeerSessionView::new(session, Some(user.full_name))))
}

pub async fn list_sessions(
    State(state): State<AppState>,
    AuthUser(_user): AuthUser,
    Query(filter): Query<SessionFilter>,
) -> ApiResult<Json<Vec<PeerSessionView>>> {
    let pool = state.pool()?;
    let sessions =
        db::list_open_sessions(pool, filter.status, filter.skip.max(0), filter.limit.clamp(0, 100)).await?;

    let teacher_ids: Vec<Uuid> = sessions.iter().map(|s| s.teacher_user_id).collect();
    let names = db::user_names(pool, &teacher_ids).await?;

    let views = sessions
        .into_iter()
        .map(|s| {
            let name = names.get(&s.teacher_user_id).cloned();
            PeerSessionView::new(s, Some(name.unwrap_or_else(|| "Unknown".to_string())))
        })
        .collect();
    Ok(Json(views))
}

pub async fn my_teachings(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> ApiResult<Json<Vec<PeerSessionView>>> {
    let sessions = db::sessions_taught_by(state.pool()?, user.user_id).await?;
    let views = sessions
        .into_iter()
        .map(|s| PeerSessionView::new(s, Some(user.full_name.clone())))
        .collect();
    Ok(Json(views))
}

pub async fn get_session(
    State(state): State<AppState>,
    AuthUser(_user): AuthUser,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<PeerSessionView>> {
    let pool = state.pool()?;
    let session = load_session(pool, session_id).await?;
    let name = db::user_names(pool, &[session.teacher_user_id])
        .await?
        .remove(&session.teacher_user_id);
    Ok(Json(PeerSessionView::new(session, name)))
}

pub async fn enroll(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<EnrollResponse>> {
    let mut tx = state.pool()?.begin().await?;
    let mut session = db::lock_session(&mut *tx, session_id).await?.ok_or_else(session_not_found)?;

    let outcome = session.enroll(user.user_id, Utc::now()).map_err(|e| {
        tracing::warn!("Enrollment of {} in {} rejected: {}", user.user_id, session_id, e);
        BackendError::from(e)
    })?;
    db::save_session(&mut *tx, &session).await?;
    tx.commit().await?;

    tracing::info!(
        "{} enrolled in peer session {} ({}/{})",
        user.user_id,
        session.id,
        session.enrolled_count(),
        session.max_students
    );
    if outcome.activated {
        state.live.notify_session_status(&session.id.to_string(), session.status).await;
    }

    Ok(Json(EnrollResponse {
        message: "Successfully enrolled in peer learning session",
        peer_session_id: session.id,
        student_id: user.user_id,
    }))
}

pub async fn start(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<StartResponse>> {
    let mut tx = state.pool()?.begin().await?;
    let mut session = db::lock_session(&mut *tx, session_id).await?.ok_or_else(session_not_found)?;

    session.start(user.user_id, Utc::now())?;
    db::save_session(&mut *tx, &session).await?;
    tx.commit().await?;

    tracing::info!("Peer session {} started", session.id);
    state.live.notify_session_status(&session.id.to_string(), session.status).await;

    Ok(Json(StartResponse {
        message: "Peer learning session started",
        session_id: session.id,
        status: session.status,
        enrolled_count: session.enrolled_count(),
    }))
}

/// Complete the session and credit the teacher `enrolled × 10` coins.
pub async fn end(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<EndResponse>> {
    let mut tx = state.pool()?.begin().await?;
    let mut session = db::lock_session(&mut *tx, session_id).await?.ok_or_else(session_not_found)?;

    let coins = session.end(user.user_id, Utc::now())?;
    db::save_session(&mut *tx, &session).await?;
    add_coins(&mut *tx, session.teacher_user_id, coins).await?;
    tx.commit().await?;

    tracing::info!("Peer session {} completed, {} coins awarded", session.id, coins);
    state.live.notify_session_status(&session.id.to_string(), session.status).await;

    Ok(Json(EndResponse {
        message: "Peer learning session completed",
        session_id: session.id,
        status: session.status,
        students_taught: session.enrolled_count(),
        coins_earned: coins,
    }))
}

pub async fn messages(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<Vec<PeerMessage>>> {
    let pool = state.pool()?;
    let session = load_session(pool, session_id).await?;
    session.require_participant(user.user_id)?;
    Ok(Json(db::messages(pool, session.id).await?))
}

pub async fn chat(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(session_id): Path<Uuid>,
    Json(request): Json<NewPeerMessage>,
) -> ApiResult<Json<PeerMessage>> {
    if request.content.trim().is_empty() {
        return Err(SharedError::validation("content", "Message cannot be empty").into());
    }
    let pool = state.pool()?;
    let session = load_session(pool, session_id).await?;
    let role = session.require_participant(user.user_id)?;

    let message = db::insert_message(
        pool,
        session.id,
        user.user_id,
        &user.full_name,
        role,
        &request.content,
        &request.message_type,
        request.audio_duration,
    )
    .await?;
    tracing::debug!("{} ({}) posted in peer session {}", user.user_id, role.as_str(), session.id);
    Ok(Json(message))
}

/// Upsert the caller's rating, then recompute the session's aggregates.
pub async fn rate(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(session_id): Path<Uuid>,
    Json(request): Json<RatingRequest>,
) -> ApiResult<Json<PeerRating>> {
    let mut tx = state.pool()?.begin().await?;
    let mut session = db::lock_session(&mut *tx, session_id).await?.ok_or_else(session_not_found)?;

    session.require_rater(user.user_id)?;
    let rating = validate_rating(request.rating)?;

    let stored = db::upsert_rating(
        &mut *tx,
        session.id,
        user.user_id,
        rating,
        request.feedback.as_deref(),
        request.upvoted,
    )
    .await?;
    let summary = RatingSummary::from_ratings(db::ratings(&mut *tx, session.id).await?);
    session.apply_ratings(summary);
    session.updated_at = Utc::now();
    db::save_session(&mut *tx, &session).await?;
    tx.commit().await?;

    tracing::info!(
        "Peer session {} rated {} by {} (average {:.2} over {})",
        session.id,
        rating,
        user.user_id,
        summary.average_rating,
        summary.total_ratings
    );
    Ok(Json(stored))
}

pub async fn stats(State(state): State<AppState>, AuthUser(user): AuthUser) -> ApiResult<Json<TeachingStats>> {
    let sessions = db::sessions_taught_by(state.pool()?, user.user_id).await?;
    Ok(Json(TeachingStats::from_sessions(&sessions)))
}

/// Delete a waiting session, taking back any coins it had credited.
pub async fn delete_session(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<MessageResponse>> {
    let mut tx = state.pool()?.begin().await?;
    let session = match db::lock_session(&mut *tx, session_id).await? {
        Some(s) if s.teacher_user_id == user.user_id => s,
        _ => return Err(session_not_found()),
    };
    session.ensure_deletable()?;

    if session.coins_earned > 0 {
        if let Some(coins) = lock_coins(&mut *tx, session.teacher_user_id).await? {
            set_coins(&mut *tx, session.teacher_user_id, session.refunded_balance(coins)).await?;
        }
    }
    db::delete_session(&mut *tx, session.id).await?;
    tx.commit().await?;

    tracing::info!("Peer session {} deleted", session.id);
    state
        .live
        .notify_session_status(&session.id.to_string(), SessionStatus::Cancelled)
        .await;

    Ok(Json(MessageResponse {
        message: "Peer session deleted successfully",
    }))
}

pub async fn save_whiteboard(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(session_id): Path<Uuid>,
    Json(snapshot): Json<NewWhiteboardSnapshot>,
) -> ApiResult<Json<WhiteboardSnapshot>> {
    let pool = state.pool()?;
    let session = load_session(pool, session_id).await?;
    session.require_participant(user.user_id)?;
    Ok(Json(db::save_whiteboard(pool, session.id, &snapshot).await?))
}

pub async fn list_whiteboards(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<Vec<WhiteboardSnapshot>>> {
    let pool = state.pool()?;
    let session = load_session(pool, session_id).await?;
    session.require_participant(user.user_id)?;
    Ok(Json(db::whiteboards(pool, session.id).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_filter_defaults_and_status() {
        let filter: SessionFilter = serde_json::from_value(json!({})).unwrap();
        assert_eq!((filter.status, filter.skip, filter.limit), (None, 0, 20));

        let filter: SessionFilter = serde_json::from_value(json!({"status": "active", "limit": 5})).unwrap();
        assert_eq!(filter.status, Some(SessionStatus::Active));
        assert_eq!(filter.limit, 5);
    }

    #[test]
    fn test_view_counts_enrollment() {
        let request = NewPeerSession {
            title: "Borrowing".to_string(),
            topic: "Rust".to_string(),
            description: None,
            max_students: 3,
            scheduled_at: None,
        };
        let mut session = PeerSession::open(Uuid::new_v4(), &request, 90.0, Utc::now()).unwrap();
        session.enroll(Uuid::new_v4(), Utc::now()).unwrap();

        let value = serde_json::to_value(PeerSessionView::new(session, Some("Ada".to_string()))).unwrap();
        assert_eq!(value["enrolled_count"], 1);
        assert_eq!(value["teacher_name"], "Ada");
        assert_eq!(value["status"], "active");
        assert_eq!(value["max_students"], 3);
    }
}
