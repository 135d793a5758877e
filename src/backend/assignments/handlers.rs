/**
 * Assignment Handlers
 *
 * # Routes
 *
 * - `POST /api/assignments/create-assignment` - new assignment in the teacher's first group
 * - `GET /api/assignments/assignments` - own (teacher) or joined groups' (student) assignments
 * - `GET /api/assignments/get-assignment-viewById/{assignment_id}` - one assignment with its questions
 * - `DELETE /api/assignments/delete-assignment/{assignment_id}` - delete (owner)
 * - `POST /api/assignments/generate-question/{assignment_id}` - LLM question generation (owner)
 */

use axum::{
    extract::{Path, State},
    response::Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::backend::ai::{parse::parse_questions, prompts, LlmRequest};
use crate::backend::assignments::db::{self, QuestionSet};
use crate::backend::error::{ApiResult, BackendError};
use crate::backend::groups::db::{first_group_of, is_member};
use crate::backend::middleware::AuthUser;
use crate::backend::server::state::AppState;
use crate::shared::classroom::{Assignment, NewAssignment, Question, Role};

/// An assignment with its generated questions (empty until generated)
#[derive(Debug, Serialize)]
pub struct AssignmentDetail {
    #[serde(flatten)]
    pub assignment: Assignment,
    pub questions: Vec<Question>,
}

#[derive(Debug, Serialize)]
pub struct QuestionSetResponse {
    pub id: Uuid,
    pub assignment_id: Uuid,
    pub questions: Vec<Question>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Decode a stored question set.
pub fn stored_questions(set: &QuestionSet) -> Result<Vec<Question>, BackendError> {
    serde_json::from_value(set.questions.clone()).map_err(|e| {
        tracing::error!("Question set {} is malformed: {}", set.id, e);
        BackendError::bad_request("Invalid question format in database.")
    })
}

pub async fn create_assignment(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(request): Json<NewAssignment>,
) -> ApiResult<Json<Assignment>> {
    user.require_role(Role::Teacher)?;
    request.validate()?;
    let pool = state.pool()?;

    let group = first_group_of(pool, user.user_id).await?.ok_or_else(|| {
        BackendError::not_found("No group found for this teacher. Please create a group first.")
    })?;

    let assignment = db::create_assignment(pool, user.user_id, group.id, &request).await?;
    tracing::info!("Assignment {} created in group {}", assignment.id, group.id);
    Ok(Json(assignment))
}

pub async fn list_assignments(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> ApiResult<Json<Vec<Assignment>>> {
    let pool = state.pool()?;
    let assignments = match user.role {
        Role::Teacher => db::assignments_by_owner(pool, user.user_id).await?,
        Role::Student => db::assignments_for_member(pool, user.user_id).await?,
    };
    Ok(Json(assignments))
}

pub async fn get_assignment(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(assignment_id): Path<Uuid>,
) -> ApiResult<Json<AssignmentDetail>> {
    let pool = state.pool()?;
    let assignment = db::get_assignment(pool, assignment_id)
        .await?
        .ok_or_else(|| BackendError::not_found("assignment not found"))?;

    let member = match user.role {
        Role::Student => is_member(pool, assignment.group_id, user.user_id).await?,
        Role::Teacher => false,
    };
    assignment.check_view(user.user_id, user.role, member, Utc::now())?;

    let questions = match db::get_question_set(pool, assignment.id).await? {
        Some(set) => stored_questions(&set)?,
        None => Vec::new(),
    };
    Ok(Json(AssignmentDetail { assignment, questions }))
}

pub async fn delete_assignment(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(assignment_id): Path<Uuid>,
) -> ApiResult<Json<Assignment>> {
    if user.role != Role::Teacher {
        return Err(BackendError::forbidden("Only teachers can delete assignments"));
    }
    let assignment = db::delete_assignment(state.pool()?, assignment_id, user.user_id)
        .await?
        .ok_or_else(|| BackendError::not_found("Assignment not found"))?;
    tracing::info!("Assignment {} deleted", assignment.id);
    Ok(Json(assignment))
}

/// Ask the LLM for the assignment's questions and store them.
///
/// Output that does not parse as a question list is kept whole as a single
/// theory question. A provider failure stores nothing and answers 502.
pub async fn generate_questions(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(assignment_id): Path<Uuid>,
) -> ApiResult<Json<QuestionSetResponse>> {
    if user.role != Role::Teacher {
        return Err(BackendError::forbidden("Only teachers can generate questions."));
    }
    let pool = state.pool()?;

    let assignment = match db::get_assignment(pool, assignment_id).await? {
        Some(a) if a.owner_id == user.user_id => a,
        _ => return Err(BackendError::not_found("Assignment not found.")),
    };
    if db::get_question_set(pool, assignment.id).await?.is_some() {
        return Err(BackendError::bad_request("Questions already generated for this assignment."));
    }
    if assignment.description.trim().is_empty() {
        return Err(BackendError::bad_request("Assignment description is empty."));
    }

    let raw = state
        .llm
        .generate(LlmRequest::new(
            prompts::question_generation(&assignment.description),
            prompts::QUESTION_TEMPERATURE,
        ))
        .await
        .map_err(|e| {
            tracing::error!("Question generation failed for assignment {}: {}", assignment.id, e);
            BackendError::from(e)
        })?;

    let questions = parse_questions(&raw);
    let set = db::insert_question_set(pool, assignment.id, &questions).await?;
    tracing::info!("Generated {} questions for assignment {}", questions.len(), assignment.id);

    Ok(Json(QuestionSetResponse {
        id: set.id,
        assignment_id: set.assignment_id,
        questions,
        created_at: set.created_at,
        updated_at: set.updated_at,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::classroom::QuestionKind;
    use axum::http::StatusCode;
    use serde_json::json;

    fn question_set(questions: serde_json::Value) -> QuestionSet {
        QuestionSet {
            id: Uuid::new_v4(),
            assignment_id: Uuid::new_v4(),
            questions,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_stored_questions_decode() {
        let set = question_set(json!([{"id": 1, "type": "coding", "question": "Reverse a list"}]));
        let questions = stored_questions(&set).unwrap();
        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].kind, QuestionKind::Coding);
    }

    #[test]
    fn test_malformed_question_set() {
        let err = stored_questions(&question_set(json!({"not": "a list"}))).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.message(), "Invalid question format in database.");
    }

    #[test]
    fn test_detail_flattens_assignment() {
        let now = Utc::now();
        let detail = AssignmentDetail {
            assignment: Assignment {
                id: Uuid::new_v4(),
                title: "Loops".to_string(),
                description: "for and while".to_string(),
                due_date: now,
                owner_id: Uuid::new_v4(),
                group_id: Uuid::new_v4(),
                created_at: now,
                updated_at: now,
            },
            questions: Vec::new(),
        };
        let value = serde_json::to_value(&detail).unwrap();
        assert_eq!(value["title"], "Loops");
        assert_eq!(value["questions"], json!([]));
    }
}
