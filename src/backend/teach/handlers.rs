/**
 * Teach Session Handlers
 *
 * A student explains a topic to an AI that plays the learner. Every route
 * works on the caller's own sessions; anyone else's session is a 404.
 *
 * # Routes
 *
 * - `POST /api/teach-sessions/sessions` - create (adds the AI greeting)
 * - `GET /api/teach-sessions/sessions` - list, `skip`/`limit`
 * - `GET /api/teach-sessions/sessions/{id}` - one session with messages and whiteboards
 * - `PUT /api/teach-sessions/sessions/{id}` - partial update
 * - `DELETE /api/teach-sessions/sessions/{id}` - delete
 * - `POST /api/teach-sessions/sessions/{id}/chat` - one turn with the AI student
 * - `POST /api/teach-sessions/sessions/{id}/chat/stream` - same turn, reply streamed as plain text
 * - `POST|GET /api/teach-sessions/sessions/{id}/whiteboard` - save / list snapshots
 * - `POST /api/teach-sessions/sessions/{id}/evaluate` - AI scoring of the session
 */

use std::convert::Infallible;
use std::future::Future;

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Json, Response},
};
use chrono::Utc;
use futures_util::stream::{self, BoxStream, Stream};
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::backend::ai::{prompts, AiError, LlmRequest};
use crate::backend::assignments::db::assignments_by_ids;
use crate::backend::error::{ApiResult, BackendError};
use crate::backend::middleware::AuthUser;
use crate::backend::notes::db::notes_by_ids;
use crate::backend::server::state::AppState;
use crate::backend::teach::db;
use crate::shared::error::SharedError;
use crate::shared::teach::{
    default_message_type, format_history, format_references, greeting, ChatReply, ChatRequest, EvaluationRequest,
    NewTeachSession, NewWhiteboardSnapshot, SessionEvaluation, Speaker, TeachMessage, TeachSession,
    TeachSessionUpdate, WhiteboardSnapshot, HISTORY_WINDOW,
};

#[derive(Debug, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub skip: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    20
}

#[derive(Debug, Serialize)]
pub struct TeachSessionDetail {
    #[serde(flatten)]
    pub session: TeachSession,
    pub messages: Vec<TeachMessage>,
    pub whiteboard_data: Vec<WhiteboardSnapshot>,
}

#[derive(Debug, Serialize)]
pub struct EvaluationResponse {
    pub session_id: Uuid,
    pub ai_summary: String,
    pub clarity_score: i32,
    pub completeness_score: i32,
    pub feedback: String,
    pub areas_for_improvement: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    pub message: &'static str,
}

async fn own_session(pool: &PgPool, session_id: Uuid, user_id: Uuid) -> ApiResult<TeachSession> {
    db::get_own_session(pool, session_id, user_id)
        .await?
        .ok_or_else(|| BackendError::not_found("Session not found"))
}

/// Reference notes and assignments rendered for the prompt.
async fn reference_material(pool: &PgPool, session: &TeachSession) -> ApiResult<String> {
    let notes = if session.reference_note_ids.is_empty() {
        Vec::new()
    } else {
        notes_by_ids(pool, &session.reference_note_ids).await?
    };
    let assignments = if session.reference_assignment_ids.is_empty() {
        Vec::new()
    } else {
        assignments_by_ids(pool, &session.reference_assignment_ids).await?
    };

    let items = notes
        .iter()
        .map(|n| ("Note", n.title.as_str(), n.content.as_str()))
        .chain(assignments.iter().map(|a| ("Assignment", a.title.as_str(), a.description.as_str())));
    Ok(format_references(items))
}

pub async fn create_session(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(request): Json<NewTeachSession>,
) -> ApiResult<Json<TeachSession>> {
    if request.title.trim().is_empty() || request.topic.trim().is_empty() {
        return Err(SharedError::validation("title", "Title and topic are required").into());
    }
    let pool = state.pool()?;

    let session = db::create_session(pool, user.user_id, &request).await?;
    db::insert_message(
        pool,
        session.id,
        Speaker::Ai,
        &greeting(&session.topic),
        &default_message_type(),
        None,
    )
    .await?;

    tracing::info!("Teach session {} created by {}", session.id, user.user_id);
    Ok(Json(session))
}

pub async fn list_sessions(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Query(page): Query<Pagination>,
) -> ApiResult<Json<Vec<TeachSession>>> {
    let sessions = db::list_sessions(state.pool()?, user.user_id, page.skip.max(0), page.limit.clamp(0, 100)).await?;
    Ok(Json(sessions))
}

pub async fn get_session(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<TeachSessionDetail>> {
    let pool = state.pool()?;
    let session = own_session(pool, session_id, user.user_id).await?;
    let messages = db::messages(pool, session.id).await?;
    let whiteboard_data = db::whiteboards(pool, session.id).await?;
    Ok(Json(TeachSessionDetail {
        session,
        messages,
        whiteboard_data,
    }))
}

pub async fn update_session(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(session_id): Path<Uuid>,
    Json(update): Json<TeachSessionUpdate>,
) -> ApiResult<Json<TeachSession>> {
    let pool = state.pool()?;
    let mut session = own_session(pool, session_id, user.user_id).await?;
    session.apply_update(&update, Utc::now());
    Ok(Json(db::save_session(pool, &session).await?))
}

pub async fn delete_session(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<DeletedResponse>> {
    if !db::delete_session(state.pool()?, session_id, user.user_id).await? {
        return Err(BackendError::not_found("Session not found"));
    }
    tracing::info!("Teach session {} deleted", session_id);
    Ok(Json(DeletedResponse {
        message: "Session deleted successfully",
    }))
}

/// One chat turn. The student's message is stored before the LLM is asked,
/// so it survives a provider failure (which answers 502).
/// Store the student's turn and build the request for the AI student's reply.
async fn start_turn(pool: &PgPool, session: &TeachSession, request: ChatRequest) -> ApiResult<LlmRequest> {
    if request.message.trim().is_empty() {
        return Err(SharedError::validation("message", "Message cannot be empty").into());
    }
    db::insert_message(
        pool,
        session.id,
        Speaker::Student,
        &request.message,
        &request.message_type,
        request.audio_duration,
    )
    .await?;

    let references = reference_material(pool, session).await?;
    let history = format_history(&db::recent_messages(pool, session.id, HISTORY_WINDOW).await?);
    Ok(LlmRequest::new(
        prompts::ai_student_reply(
            &session.topic,
            &references,
            &history,
            &request.message,
            request.whiteboard_image.is_some(),
        ),
        prompts::CHAT_TEMPERATURE,
    )
    .with_image(request.whiteboard_image))
}

pub async fn chat(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(session_id): Path<Uuid>,
    Json(request): Json<ChatRequest>,
) -> ApiResult<Json<ChatReply>> {
    let pool = state.pool()?;
    let session = own_session(pool, session_id, user.user_id).await?;
    let llm_request = start_turn(pool, &session, request).await?;

    let reply = state.llm.generate(llm_request).await.map_err(|e| {
        tracing::error!("AI student reply failed for session {}: {}", session.id, e);
        BackendError::from(e)
    })?;

    let message = db::insert_message(pool, session.id, Speaker::Ai, &reply, &default_message_type(), None).await?;
    tracing::debug!("AI student replied in session {}", session.id);

    Ok(Json(ChatReply {
        ai_message: reply,
        message_id: message.id,
        session_id: session.id,
    }))
}

pub async fn chat_stream(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(session_id): Path<Uuid>,
    Json(request): Json<ChatRequest>,
) -> ApiResult<Response> {
    let pool = state.pool()?.clone();
    let session = own_session(&pool, session_id, user.user_id).await?;
    let llm_request = start_turn(&pool, &session, request).await?;

    let chunks = state.llm.generate_stream(llm_request).await.map_err(|e| {
        tracing::error!("AI student stream failed for session {}: {}", session.id, e);
        BackendError::from(e)
    })?;

    let session_id = session.id;
    let body = relay_reply(chunks, move |reply| async move {
        if reply.trim().is_empty() {
            tracing::warn!("AI student streamed an empty reply in session {}", session_id);
            return;
        }
        match db::insert_message(&pool, session_id, Speaker::Ai, &reply, &default_message_type(), None).await {
            Ok(message) => tracing::debug!("Streamed reply {} stored in session {}", message.id, session_id),
            Err(e) => tracing::error!("Failed to store streamed reply in session {}: {}", session_id, e),
        }
    });

    Ok(([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], Body::from_stream(body)).into_response())
}

/// Forward reply chunks and hand the full text to `on_complete` when the model
/// finishes. A mid-stream failure ends the body with an error line instead.
pub fn relay_reply<F, Fut>(
    chunks: BoxStream<'static, Result<String, AiError>>,
    on_complete: F,
) -> impl Stream<Item = Result<String, Infallible>> + Send + 'static
where
    F: FnOnce(String) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    struct Relay<F> {
        chunks: BoxStream<'static, Result<String, AiError>>,
        full: String,
        on_complete: Option<F>,
    }

    let relay = Relay {
        chunks,
        full: String::new(),
        on_complete: Some(on_complete),
    };
    stream::unfold(Some(relay), |relay| async move {
        let mut relay = relay?;
        match relay.chunks.next().await {
            Some(Ok(text)) => {
                relay.full.push_str(&text);
                Some((Ok::<_, Infallible>(text), Some(relay)))
            }
            Some(Err(e)) => {
                tracing::error!("AI student stream broke off: {}", e);
                Some((Ok(format!("\n\nError: {}", e)), None))
            }
            None => {
                if let Some(done) = relay.on_complete.take() {
                    done(std::mem::take(&mut relay.full)).await;
                }
                None
            }
        }
    })
}

pub async fn save_whiteboard(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(session_id): Path<Uuid>,
    Json(snapshot): Json<NewWhiteboardSnapshot>,
) -> ApiResult<Json<WhiteboardSnapshot>> {
    let pool = state.pool()?;
    let session = own_session(pool, session_id, user.user_id).await?;
    Ok(Json(db::save_whiteboard(pool, session.id, &snapshot).await?))
}

pub async fn list_whiteboards(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<Vec<WhiteboardSnapshot>>> {
    let pool = state.pool()?;
    let session = own_session(pool, session_id, user.user_id).await?;
    Ok(Json(db::whiteboards(pool, session.id).await?))
}

/// Score the session. A failed or malformed LLM reply returns the zero-score
/// placeholder and leaves the session untouched.
pub async fn evaluate(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(session_id): Path<Uuid>,
    request: Option<Json<EvaluationRequest>>,
) -> ApiResult<Json<EvaluationResponse>> {
    let request = request.map(|Json(r)| r).unwrap_or_default();
    let pool = state.pool()?;
    let mut session = own_session(pool, session_id, user.user_id).await?;

    let transcript = format_history(&db::messages(pool, session.id).await?);
    let llm_request = LlmRequest::new(
        prompts::teach_evaluation(&session.topic, &transcript, request.whiteboard_image.is_some()),
        prompts::EVALUATION_TEMPERATURE,
    )
    .with_image(request.whiteboard_image);

    let evaluation = match state.llm.generate_json::<SessionEvaluation>(llm_request).await {
        Ok(evaluation) => {
            let evaluation = evaluation.clamped();
            session.apply_evaluation(&evaluation, Utc::now());
            db::save_session(pool, &session).await?;
            tracing::info!(
                "Teach session {} evaluated: clarity {}, completeness {}",
                session.id,
                evaluation.clarity_score,
                evaluation.completeness_score
            );
            evaluation
        }
        Err(e) => {
            tracing::warn!("Evaluation unavailable for teach session {}: {}", session.id, e);
            SessionEvaluation::unavailable()
        }
    };

    Ok(Json(EvaluationResponse {
        session_id: session.id,
        ai_summary: evaluation.summary,
        clarity_score: evaluation.clarity_score,
        completeness_score: evaluation.completeness_score,
        feedback: evaluation.feedback,
        areas_for_improvement: evaluation.areas_for_improvement,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::{Arc, Mutex};

    #[test]
    fn test_pagination_defaults() {
        let page: Pagination = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!((page.skip, page.limit), (0, 20));
    }

    fn recorder() -> (Arc<Mutex<Option<String>>>, impl FnOnce(String) -> std::future::Ready<()> + Send + 'static) {
        let stored = Arc::new(Mutex::new(None));
        let sink = stored.clone();
        let on_complete = move |reply: String| {
            *sink.lock().unwrap() = Some(reply);
            std::future::ready(())
        };
        (stored, on_complete)
    }

    #[tokio::test]
    async fn test_relay_forwards_chunks_then_stores_full_reply() {
        let chunks = stream::iter(vec![Ok("What ".to_string()), Ok("is a fraction?".to_string())]).boxed();
        let (stored, on_complete) = recorder();

        let body: Vec<String> = relay_reply(chunks, on_complete).map(|c| c.unwrap()).collect().await;
        assert_eq!(body, vec!["What ".to_string(), "is a fraction?".to_string()]);
        assert_eq!(stored.lock().unwrap().as_deref(), Some("What is a fraction?"));
    }

    #[tokio::test]
    async fn test_relay_error_ends_stream_without_storing() {
        let chunks = stream::iter(vec![Ok("Half".to_string()), Err(AiError::EmptyResponse), Ok("never".to_string())]).boxed();
        let (stored, on_complete) = recorder();

        let body: Vec<String> = relay_reply(chunks, on_complete).map(|c| c.unwrap()).collect().await;
        assert_eq!(body.len(), 2);
        assert_eq!(body[0], "Half");
        assert!(body[1].starts_with("\n\nError: "));
        assert!(stored.lock().unwrap().is_none());
    }
}
