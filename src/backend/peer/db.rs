//! Peer session queries
//!
//! Lifecycle writes (enroll, end, delete) take a `&mut PgConnection` so the
//! handler can run them inside one transaction after `lock_session`.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::shared::peer::{PeerSession, SenderRole, SessionStatus};
use crate::shared::teach::{NewWhiteboardSnapshot, WhiteboardSnapshot};

const SESSION_COLUMNS: &str = "id, teacher_user_id, title, topic, description, status, max_students, \
    teacher_best_score, average_rating, total_ratings, upvotes, coins_earned, enrolled_student_ids, \
    scheduled_at, started_at, completed_at, created_at, updated_at";

/// Chat message in a peer session, with the sender's name
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PeerMessage {
    pub id: Uuid,
    pub peer_session_id: Uuid,
    pub sender_id: Uuid,
    pub sender_name: Option<String>,
    #[sqlx(try_from = "String")]
    pub sender_role: SenderRole,
    pub content: String,
    pub message_type: String,
    pub audio_duration: Option<i32>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PeerRating {
    pub id: Uuid,
    pub peer_session_id: Uuid,
    pub student_id: Uuid,
    pub rating: i32,
    pub feedback: Option<String>,
    pub upvoted: bool,
    pub created_at: DateTime<Utc>,
}

pub async fn insert_session(pool: &PgPool, session: &PeerSession) -> Result<PeerSession, sqlx::Error> {
    let query = format!(
        r#"
        INSERT INTO peer_sessions ({SESSION_COLUMNS})
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
        RETURNING {SESSION_COLUMNS}
        "#
    );
    sqlx::query_as::<_, PeerSession>(&query)
        .bind(session.id)
        .bind(session.teacher_user_id)
        .bind(&session.title)
        .bind(&session.topic)
        .bind(&session.description)
        .bind(session.status.as_str())
        .bind(session.max_students)
        .bind(session.teacher_best_score)
        .bind(session.average_rating)
        .bind(session.total_ratings)
        .bind(session.upvotes)
        .bind(session.coins_earned)
        .bind(&session.enrolled_student_ids)
        .bind(session.scheduled_at)
        .bind(session.started_at)
        .bind(session.completed_at)
        .bind(session.created_at)
        .bind(session.updated_at)
        .fetch_one(pool)
        .await
}

pub async fn get_session(pool: &PgPool, id: Uuid) -> Result<Option<PeerSession>, sqlx::Error> {
    let query = format!("SELECT {SESSION_COLUMNS} FROM peer_sessions WHERE id = $1");
    sqlx::query_as::<_, PeerSession>(&query).bind(id).fetch_optional(pool).await
}

/// Load the session and lock its row until the transaction ends.
pub async fn lock_session(conn: &mut PgConnection, id: Uuid) -> Result<Option<PeerSession>, sqlx::Error> {
    let query = format!("SELECT {SESSION_COLUMNS} FROM peer_sessions WHERE id = $1 FOR UPDATE");
    sqlx::query_as::<_, PeerSession>(&query).bind(id).fetch_optional(conn).await
}

/// Write back the lifecycle and rating fields of `session`.
pub async fn save_session(conn: &mut PgConnection, session: &PeerSession) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE peer_sessions
        SET status = $2, enrolled_student_ids = $3, started_at = $4, completed_at = $5, coins_earned = $6,
            average_rating = $7, total_ratings = $8, upvotes = $9, updated_at = $10
        WHERE id = $1
        "#,
    )
    .bind(session.id)
    .bind(session.status.as_str())
    .bind(&session.enrolled_student_ids)
    .bind(session.started_at)
    .bind(session.completed_at)
    .bind(session.coins_earned)
    .bind(session.average_rating)
    .bind(session.total_ratings)
    .bind(session.upvotes)
    .bind(session.updated_at)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn delete_session(conn: &mut PgConnection, id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM peer_sessions WHERE id = $1")
        .bind(id)
        .execute(conn)
        .await?;
    Ok(())
}

/// Waiting and active sessions, optionally narrowed to one status, newest first.
pub async fn list_open_sessions(
    pool: &PgPool,
    status: Option<SessionStatus>,
    skip: i64,
    limit: i64,
) -> Result<Vec<PeerSession>, sqlx::Error> {
    let query = format!(
        r#"
        SELECT {SESSION_COLUMNS} FROM peer_sessions
        WHERE status IN ('waiting', 'active') AND ($1::text IS NULL OR status = $1)
        ORDER BY created_at DESC
        OFFSET $2 LIMIT $3
        "#
    );
    sqlx::query_as::<_, PeerSession>(&query)
        .bind(status.map(|s| s.as_str()))
        .bind(skip)
        .bind(limit)
        .fetch_all(pool)
        .await
}

pub async fn sessions_taught_by(pool: &PgPool, teacher_id: Uuid) -> Result<Vec<PeerSession>, sqlx::Error> {
    let query = format!("SELECT {SESSION_COLUMNS} FROM peer_sessions WHERE teacher_user_id = $1 ORDER BY created_at DESC");
    sqlx::query_as::<_, PeerSession>(&query).bind(teacher_id).fetch_all(pool).await
}

/// Full names by user id.
pub async fn user_names(pool: &PgPool, ids: &[Uuid]) -> Result<HashMap<Uuid, String>, sqlx::Error> {
    let rows = sqlx::query_as::<_, (Uuid, String)>("SELECT id, full_name FROM users WHERE id = ANY($1)")
        .bind(ids)
        .fetch_all(pool)
        .await?;
    Ok(rows.into_iter().collect())
}

pub async fn messages(pool: &PgPool, session_id: Uuid) -> Result<Vec<PeerMessage>, sqlx::Error> {
    sqlx::query_as::<_, PeerMessage>(
        r#"
        SELECT m.id, m.peer_session_id, m.sender_id, u.full_name AS sender_name, m.sender_role,
               m.content, m.message_type, m.audio_duration, m.created_at
        FROM peer_session_messages m
        LEFT JOIN users u ON u.id = m.sender_id
        WHERE m.peer_session_id = $1
        ORDER BY m.created_at
        "#,
    )
    .bind(session_id)
    .fetch_all(pool)
    .await
}

#[allow(clippy::too_many_arguments)]
pub async fn insert_message(
    pool: &PgPool,
    session_id: Uuid,
    sender_id: Uuid,
    sender_name: &str,
    sender_role: SenderRole,
    content: &str,
    message_type: &str,
    audio_duration: Option<i32>,
) -> Result<PeerMessage, sqlx::Error> {
    sqlx::query_as::<_, PeerMessage>(
        r#"
        INSERT INTO peer_session_messages
            (id, peer_session_id, sender_id, sender_role, content, message_type, audio_duration, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, clock_timestamp())
        RETURNING id, peer_session_id, sender_id, $8::text AS sender_name, sender_role,
                  content, message_type, audio_duration, created_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(session_id)
    .bind(sender_id)
    .bind(sender_role.as_str())
    .bind(content)
    .bind(message_type)
    .bind(audio_duration)
    .bind(sender_name)
    .fetch_one(pool)
    .await
}

/// Insert or replace the student's rating of a session.
pub async fn upsert_rating(
    conn: &mut PgConnection,
    session_id: Uuid,
    student_id: Uuid,
    rating: i32,
    feedback: Option<&str>,
    upvoted: bool,
) -> Result<PeerRating, sqlx::Error> {
    sqlx::query_as::<_, PeerRating>(
        r#"
        INSERT INTO peer_session_ratings (id, peer_session_id, student_id, rating, feedback, upvoted, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, NOW())
        ON CONFLICT (peer_session_id, student_id)
        DO UPDATE SET rating = EXCLUDED.rating, feedback = EXCLUDED.feedback, upvoted = EXCLUDED.upvoted
        RETURNING id, peer_session_id, student_id, rating, feedback, upvoted, created_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(session_id)
    .bind(student_id)
    .bind(rating)
    .bind(feedback)
    .bind(upvoted)
    .fetch_one(conn)
    .await
}

/// `(rating, upvoted)` of every rating of the session.
pub async fn ratings(conn: &mut PgConnection, session_id: Uuid) -> Result<Vec<(i32, bool)>, sqlx::Error> {
    sqlx::query_as::<_, (i32, bool)>("SELECT rating, upvoted FROM peer_session_ratings WHERE peer_session_id = $1")
        .bind(session_id)
        .fetch_all(conn)
        .await
}

pub async fn save_whiteboard(
    pool: &PgPool,
    session_id: Uuid,
    snapshot: &NewWhiteboardSnapshot,
) -> Result<WhiteboardSnapshot, sqlx::Error> {
    sqlx::query_as::<_, WhiteboardSnapshot>(
        r#"
        INSERT INTO peer_whiteboards (id, peer_session_id, drawing_data, snapshot_url, description, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, NOW(), NOW())
        RETURNING id, peer_session_id AS session_id, drawing_data, snapshot_url, description, created_at, updated_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(session_id)
    .bind(&snapshot.drawing_data)
    .bind(&snapshot.snapshot_url)
    .bind(&snapshot.description)
    .fetch_one(pool)
    .await
}

pub async fn whiteboards(pool: &PgPool, session_id: Uuid) -> Result<Vec<WhiteboardSnapshot>, sqlx::Error> {
    sqlx::query_as::<_, WhiteboardSnapshot>(
        r#"
        SELECT id, peer_session_id AS session_id, drawing_data, snapshot_url, description, created_at, updated_at
        FROM peer_whiteboards WHERE peer_session_id = $1 ORDER BY created_at
        "#,
    )
    .bind(session_id)
    .fetch_all(pool)
    .await
}
