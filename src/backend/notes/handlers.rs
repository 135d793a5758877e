/**
 * Note Handlers
 *
 * # Routes
 *
 * - `POST /api/notes/create-note` - publish a note to the teacher's first group
 * - `GET /api/notes/teacher-get-notes` - the teacher's notes, newest first
 * - `GET /api/notes/{note_id}` - one note
 * - `PUT /api/notes/edit-note/{note_id}` - partial edit (owner)
 * - `DELETE /api/notes/delete-note/{note_id}` - delete (owner)
 * - `POST /api/notes/notes-generates` - LLM study notes for a title
 * - `GET /api/auth/student/notes` - notes of every group the student joined
 */

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::backend::ai::{prompts, LlmRequest};
use crate::backend::error::{ApiResult, BackendError};
use crate::backend::groups::db::{first_group_of, joined_group_ids};
use crate::backend::middleware::AuthUser;
use crate::backend::notes::db;
use crate::backend::server::state::AppState;
use crate::shared::classroom::{NewNote, Note, NoteEdit, Role};

#[derive(Debug, Serialize)]
pub struct NoteList {
    pub count: usize,
    pub notes: Vec<Note>,
}

impl From<Vec<Note>> for NoteList {
    fn from(notes: Vec<Note>) -> Self {
        Self {
            count: notes.len(),
            notes,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct GenerateNotesRequest {
    pub title: String,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct GeneratedNotes {
    pub title: String,
    pub generated_notes: String,
    pub format: &'static str,
}

pub async fn create_note(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(request): Json<NewNote>,
) -> ApiResult<Json<Note>> {
    user.require_role(Role::Teacher)?;
    request.validate()?;
    let pool = state.pool()?;

    let group = first_group_of(pool, user.user_id).await?.ok_or_else(|| {
        BackendError::not_found("No group found for this teacher. Please create a group first.")
    })?;

    let note = db::create_note(pool, user.user_id, group.id, &request).await?;
    tracing::info!("Note {} created in group {}", note.id, group.id);
    Ok(Json(note))
}

pub async fn teacher_notes(State(state): State<AppState>, AuthUser(user): AuthUser) -> ApiResult<Json<NoteList>> {
    user.require_role(Role::Teacher)?;
    let notes = db::notes_by_owner(state.pool()?, user.user_id).await?;
    Ok(Json(notes.into()))
}

pub async fn get_note(
    State(state): State<AppState>,
    AuthUser(_user): AuthUser,
    Path(note_id): Path<Uuid>,
) -> ApiResult<Json<Note>> {
    let note = db::get_note(state.pool()?, note_id)
        .await?
        .ok_or_else(|| BackendError::not_found("Note not found"))?;
    Ok(Json(note))
}

pub async fn edit_note(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(note_id): Path<Uuid>,
    Json(edit): Json<NoteEdit>,
) -> ApiResult<Json<Note>> {
    user.require_role(Role::Teacher)?;
    let pool = state.pool()?;

    match db::get_note(pool, note_id).await? {
        Some(note) if note.owner_id == user.user_id => {}
        _ => return Err(BackendError::not_found("Note not found or not owned by user")),
    }

    let note = db::update_note(pool, note_id, &edit).await?;
    tracing::info!("Note {} edited", note.id);
    Ok(Json(note))
}

pub async fn delete_note(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(note_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    user.require_role(Role::Teacher)?;
    if !db::delete_note(state.pool()?, note_id, user.user_id).await? {
        return Err(BackendError::not_found("Note not found or not owned by user"));
    }
    tracing::info!("Note {} deleted", note_id);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn student_notes(State(state): State<AppState>, AuthUser(user): AuthUser) -> ApiResult<Json<NoteList>> {
    let pool = state.pool()?;
    let groups = joined_group_ids(pool, user.user_id).await?;
    if groups.is_empty() {
        return Err(BackendError::bad_request("You haven't joined any groups"));
    }
    let notes = db::notes_in_groups(pool, &groups).await?;
    Ok(Json(notes.into()))
}

/// Markdown study notes for a title, straight from the LLM.
pub async fn generate_notes(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(request): Json<GenerateNotesRequest>,
) -> ApiResult<Json<GeneratedNotes>> {
    let title = request.title.trim();
    if title.is_empty() {
        return Err(BackendError::bad_request("Title cannot be empty"));
    }
    user.require_role(Role::Teacher)?;

    let generated_notes = state
        .llm
        .generate(LlmRequest::new(prompts::study_notes(title), prompts::NOTES_TEMPERATURE))
        .await
        .map_err(|e| {
            tracing::error!("Note generation failed for '{}': {}", title, e);
            BackendError::from(e)
        })?;

    Ok(Json(GeneratedNotes {
        title: title.to_string(),
        generated_notes,
        format: "markdown",
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_note_list_counts() {
        let now = Utc::now();
        let note = Note {
            id: Uuid::new_v4(),
            title: "Ohm's law".to_string(),
            content: "V = IR".to_string(),
            owner_id: Uuid::new_v4(),
            group_id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
        };
        let list = NoteList::from(vec![note.clone(), note]);
        assert_eq!(list.count, 2);

        let json = serde_json::to_value(NoteList::from(Vec::new())).unwrap();
        assert_eq!(json, serde_json::json!({"count": 0, "notes": []}));
    }
}
