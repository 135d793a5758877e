use sqlx::PgPool;
use uuid::Uuid;

use crate::shared::classroom::{NewNote, Note, NoteEdit};

const NOTE_COLUMNS: &str = "id, title, content, owner_id, group_id, created_at, updated_at";

pub async fn create_note(pool: &PgPool, owner_id: Uuid, group_id: Uuid, note: &NewNote) -> Result<Note, sqlx::Error> {
    let query = format!(
        r#"
        INSERT INTO notes (id, title, content, owner_id, group_id, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, NOW(), NOW())
        RETURNING {NOTE_COLUMNS}
        "#
    );
    sqlx::query_as::<_, Note>(&query)
        .bind(Uuid::new_v4())
        .bind(note.title.trim())
        .bind(&note.content)
        .bind(owner_id)
        .bind(group_id)
        .fetch_one(pool)
        .await
}

pub async fn get_note(pool: &PgPool, id: Uuid) -> Result<Option<Note>, sqlx::Error> {
    let query = format!("SELECT {NOTE_COLUMNS} FROM notes WHERE id = $1");
    sqlx::query_as::<_, Note>(&query).bind(id).fetch_optional(pool).await
}

pub async fn notes_by_owner(pool: &PgPool, owner_id: Uuid) -> Result<Vec<Note>, sqlx::Error> {
    let query = format!("SELECT {NOTE_COLUMNS} FROM notes WHERE owner_id = $1 ORDER BY created_at DESC");
    sqlx::query_as::<_, Note>(&query).bind(owner_id).fetch_all(pool).await
}

/// Notes published to any of `group_ids`, newest first.
pub async fn notes_in_groups(pool: &PgPool, group_ids: &[Uuid]) -> Result<Vec<Note>, sqlx::Error> {
    let query = format!("SELECT {NOTE_COLUMNS} FROM notes WHERE group_id = ANY($1) ORDER BY created_at DESC");
    sqlx::query_as::<_, Note>(&query).bind(group_ids).fetch_all(pool).await
}

/// Notes by id, for teach-session reference material.
pub async fn notes_by_ids(pool: &PgPool, ids: &[Uuid]) -> Result<Vec<Note>, sqlx::Error> {
    let query = format!("SELECT {NOTE_COLUMNS} FROM notes WHERE id = ANY($1)");
    sqlx::query_as::<_, Note>(&query).bind(ids).fetch_all(pool).await
}

/// Apply a partial edit; absent fields keep their value.
pub async fn update_note(pool: &PgPool, id: Uuid, edit: &NoteEdit) -> Result<Note, sqlx::Error> {
    let query = format!(
        r#"
        UPDATE notes
        SET title = COALESCE($2, title), content = COALESCE($3, content), updated_at = NOW()
        WHERE id = $1
        RETURNING {NOTE_COLUMNS}
        "#
    );
    sqlx::query_as::<_, Note>(&query)
        .bind(id)
        .bind(edit.title.as_deref())
        .bind(edit.content.as_deref())
        .fetch_one(pool)
        .await
}

/// Delete a note owned by `owner_id`. Returns whether a row was removed.
pub async fn delete_note(pool: &PgPool, id: Uuid, owner_id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM notes WHERE id = $1 AND owner_id = $2")
        .bind(id)
        .bind(owner_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
