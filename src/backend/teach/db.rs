//! Teach session queries

use sqlx::PgPool;
use uuid::Uuid;

use crate::shared::teach::{
    NewTeachSession, NewWhiteboardSnapshot, Speaker, TeachMessage, TeachSession, TeachStatus, WhiteboardSnapshot,
};

const SESSION_COLUMNS: &str = "id, student_id, title, topic, status, duration_minutes, ai_summary, clarity_score, \
    completeness_score, feedback, reference_note_ids, reference_assignment_ids, created_at, updated_at, completed_at";
const MESSAGE_COLUMNS: &str = "id, session_id, role, content, message_type, audio_duration, created_at";
const WHITEBOARD_COLUMNS: &str = "id, session_id, drawing_data, snapshot_url, description, created_at, updated_at";

pub async fn create_session(pool: &PgPool, student_id: Uuid, request: &NewTeachSession) -> Result<TeachSession, sqlx::Error> {
    let query = format!(
        r#"
        INSERT INTO teach_sessions
            (id, student_id, title, topic, status, duration_minutes, reference_note_ids,
             reference_assignment_ids, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, 0, $6, $7, NOW(), NOW())
        RETURNING {SESSION_COLUMNS}
        "#
    );
    sqlx::query_as::<_, TeachSession>(&query)
        .bind(Uuid::new_v4())
        .bind(student_id)
        .bind(request.title.trim())
        .bind(request.topic.trim())
        .bind(TeachStatus::Active.as_str())
        .bind(&request.reference_note_ids)
        .bind(&request.reference_assignment_ids)
        .fetch_one(pool)
        .await
}

/// The student's sessions, newest first.
pub async fn list_sessions(pool: &PgPool, student_id: Uuid, skip: i64, limit: i64) -> Result<Vec<TeachSession>, sqlx::Error> {
    let query = format!(
        "SELECT {SESSION_COLUMNS} FROM teach_sessions WHERE student_id = $1 ORDER BY created_at DESC OFFSET $2 LIMIT $3"
    );
    sqlx::query_as::<_, TeachSession>(&query)
        .bind(student_id)
        .bind(skip)
        .bind(limit)
        .fetch_all(pool)
        .await
}

/// A session, only if it belongs to `student_id`.
pub async fn get_own_session(pool: &PgPool, id: Uuid, student_id: Uuid) -> Result<Option<TeachSession>, sqlx::Error> {
    let query = format!("SELECT {SESSION_COLUMNS} FROM teach_sessions WHERE id = $1 AND student_id = $2");
    sqlx::query_as::<_, TeachSession>(&query)
        .bind(id)
        .bind(student_id)
        .fetch_optional(pool)
        .await
}

/// Write back every mutable field of `session`.
pub async fn save_session(pool: &PgPool, session: &TeachSession) -> Result<TeachSession, sqlx::Error> {
    let query = format!(
        r#"
        UPDATE teach_sessions
        SET title = $2, status = $3, duration_minutes = $4, ai_summary = $5, clarity_score = $6,
            completeness_score = $7, feedback = $8, updated_at = $9, completed_at = $10
        WHERE id = $1
        RETURNING {SESSION_COLUMNS}
        "#
    );
    sqlx::query_as::<_, TeachSession>(&query)
        .bind(session.id)
        .bind(&session.title)
        .bind(session.status.as_str())
        .bind(session.duration_minutes)
        .bind(&session.ai_summary)
        .bind(session.clarity_score)
        .bind(session.completeness_score)
        .bind(&session.feedback)
        .bind(session.updated_at)
        .bind(session.completed_at)
        .fetch_one(pool)
        .await
}

pub async fn delete_session(pool: &PgPool, id: Uuid, student_id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM teach_sessions WHERE id = $1 AND student_id = $2")
        .bind(id)
        .bind(student_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// `(clarity, completeness)` of every completed session of the student.
pub async fn completed_scores(pool: &PgPool, student_id: Uuid) -> Result<Vec<(Option<i32>, Option<i32>)>, sqlx::Error> {
    sqlx::query_as::<_, (Option<i32>, Option<i32>)>(
        "SELECT clarity_score, completeness_score FROM teach_sessions WHERE student_id = $1 AND status = $2",
    )
    .bind(student_id)
    .bind(TeachStatus::Completed.as_str())
    .fetch_all(pool)
    .await
}

pub async fn insert_message(
    pool: &PgPool,
    session_id: Uuid,
    role: Speaker,
    content: &str,
    message_type: &str,
    audio_duration: Option<i32>,
) -> Result<TeachMessage, sqlx::Error> {
    let query = format!(
        r#"
        INSERT INTO teach_session_messages (id, session_id, role, content, message_type, audio_duration, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, clock_timestamp())
        RETURNING {MESSAGE_COLUMNS}
        "#
    );
    sqlx::query_as::<_, TeachMessage>(&query)
        .bind(Uuid::new_v4())
        .bind(session_id)
        .bind(role.as_str())
        .bind(content)
        .bind(message_type)
        .bind(audio_duration)
        .fetch_one(pool)
        .await
}

/// The whole transcript, oldest first.
pub async fn messages(pool: &PgPool, session_id: Uuid) -> Result<Vec<TeachMessage>, sqlx::Error> {
    let query = format!("SELECT {MESSAGE_COLUMNS} FROM teach_session_messages WHERE session_id = $1 ORDER BY created_at");
    sqlx::query_as::<_, TeachMessage>(&query).bind(session_id).fetch_all(pool).await
}

/// The last `limit` messages, oldest first.
pub async fn recent_messages(pool: &PgPool, session_id: Uuid, limit: i64) -> Result<Vec<TeachMessage>, sqlx::Error> {
    let query = format!(
        "SELECT {MESSAGE_COLUMNS} FROM teach_session_messages WHERE session_id = $1 ORDER BY created_at DESC LIMIT $2"
    );
    let mut recent = sqlx::query_as::<_, TeachMessage>(&query)
        .bind(session_id)
        .bind(limit)
        .fetch_all(pool)
        .await?;
    recent.reverse();
    Ok(recent)
}

pub async fn save_whiteboard(
    pool: &PgPool,
    session_id: Uuid,
    snapshot: &NewWhiteboardSnapshot,
) -> Result<WhiteboardSnapshot, sqlx::Error> {
    let query = format!(
        r#"
        INSERT INTO teach_whiteboards (id, session_id, drawing_data, snapshot_url, description, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, NOW(), NOW())
        RETURNING {WHITEBOARD_COLUMNS}
        "#
    );
    sqlx::query_as::<_, WhiteboardSnapshot>(&query)
        .bind(Uuid::new_v4())
        .bind(session_id)
        .bind(&snapshot.drawing_data)
        .bind(&snapshot.snapshot_url)
        .bind(&snapshot.description)
        .fetch_one(pool)
        .await
}

pub async fn whiteboards(pool: &PgPool, session_id: Uuid) -> Result<Vec<WhiteboardSnapshot>, sqlx::Error> {
    let query = format!("SELECT {WHITEBOARD_COLUMNS} FROM teach_whiteboards WHERE session_id = $1 ORDER BY created_at");
    sqlx::query_as::<_, WhiteboardSnapshot>(&query).bind(session_id).fetch_all(pool).await
}
