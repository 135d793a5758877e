/**
 * Submission Handlers
 *
 * Grading and the submission statistics shown on the dashboards.
 *
 * # Routes
 *
 * - `POST /api/ai-evaluator/{assignment_id}/evaluate` - grade and store a submission (student)
 * - `GET /api/submissions/student-view/{assignment_id}` - the caller's submissions (student)
 * - `GET /api/submissions/assignment-stats/{assignment_id}` - members vs completed
 * - `GET /api/submissions/assignment-marks/{assignment_id}` - grades per student (teacher)
 * - `GET /api/submissions/total-submissions` - submissions across the teacher's assignments
 * - `GET /api/submissions/student-submissions-stats` - completions per day (student)
 * - `GET /api/submissions/student/assignments` - assignments with completion flags (student)
 * - `GET /api/submissions/student-performance-stats` - grades and monthly counts (student)
 */

use std::collections::{HashMap, HashSet};

use axum::{
    extract::{Path, State},
    response::Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::backend::ai::{prompts, AiError, LlmRequest};
use crate::backend::assignments::db::{self, GradedAssignment, StudentMark};
use crate::backend::assignments::handlers::stored_questions;
use crate::backend::error::{ApiResult, BackendError};
use crate::backend::groups::db::member_count;
use crate::backend::middleware::AuthUser;
use crate::backend::server::state::AppState;
use crate::shared::classroom::{
    completion_over_time, submissions_per_month, DailyCount, Evaluation, MonthlyCount, Question, Role, Submission,
};

#[derive(Debug, Serialize)]
pub struct EvaluationResponse {
    pub submission_id: Uuid,
    pub assignment_id: Uuid,
    pub student_id: Uuid,
    pub answers: Vec<Value>,
    pub total_marks: i32,
    pub final_feedback: String,
}

#[derive(Debug, Serialize)]
pub struct SubmissionList {
    pub submissions: Vec<Submission>,
}

#[derive(Debug, Serialize)]
pub struct AssignmentStats {
    pub assignment_id: Uuid,
    pub group_id: Uuid,
    pub total_students: i64,
    pub students_completed: i64,
}

#[derive(Debug, Serialize)]
pub struct AssignmentMarks {
    pub assignment_id: Uuid,
    pub group_id: Uuid,
    pub students: Vec<StudentMark>,
}

#[derive(Debug, Serialize)]
pub struct TotalSubmissions {
    pub teacher_id: Uuid,
    pub total_submissions: i64,
}

#[derive(Debug, Serialize)]
pub struct CompletionStats {
    pub student_id: Uuid,
    pub total_submissions: usize,
    pub completion_over_time: Vec<DailyCount>,
}

#[derive(Debug, Serialize)]
pub struct StudentAssignment {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub due_date: DateTime<Utc>,
    pub group_name: Option<String>,
    pub is_completed: bool,
    pub is_past_due: bool,
    pub submitted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct StudentAssignments {
    pub assignments: Vec<StudentAssignment>,
}

#[derive(Debug, Serialize)]
pub struct PerformanceStats {
    pub grades_vs_assignments: Vec<GradedAssignment>,
    pub submission_count_per_month: Vec<MonthlyCount>,
}

/// Pair every question with the student's answer, keyed by question id.
pub fn qa_block(questions: &[Question], answers: &HashMap<String, String>) -> String {
    questions
        .iter()
        .map(|q| {
            let answer = answers.get(&q.id.to_string()).map(|a| a.trim()).unwrap_or_default();
            format!("Question: {}\nAnswer: {}\n", q.question, answer)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// The stored evaluation for a grading call: malformed output and provider
/// failures both become zero-mark placeholders.
pub fn evaluation_from(result: Result<Evaluation, AiError>, question_count: usize) -> Evaluation {
    match result {
        Ok(evaluation) => evaluation.clamped(question_count),
        Err(AiError::InvalidJson(e)) => {
            tracing::warn!("Grader returned invalid JSON: {}", e);
            Evaluation::invalid_format()
        }
        Err(e) => {
            tracing::error!("Grading failed: {}", e);
            Evaluation::internal_error()
        }
    }
}

pub async fn evaluate_answers(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(assignment_id): Path<Uuid>,
    Json(answers): Json<HashMap<String, String>>,
) -> ApiResult<Json<EvaluationResponse>> {
    if user.role != Role::Student {
        return Err(BackendError::forbidden("Only students can submit answers."));
    }
    let pool = state.pool()?;

    if db::has_submitted(pool, assignment_id, user.user_id).await? {
        return Err(BackendError::bad_request("You have already submitted this assignment."));
    }
    let assignment = db::get_assignment(pool, assignment_id)
        .await?
        .ok_or_else(|| BackendError::not_found("Assignment not found."))?;
    let set = db::get_question_set(pool, assignment.id)
        .await?
        .ok_or_else(|| BackendError::not_found("No questions found in this assignment."))?;
    if assignment.is_past_due(Utc::now()) {
        return Err(BackendError::forbidden("The due date for this assignment has passed."));
    }

    let questions = stored_questions(&set)?;
    let prompt = prompts::grading(&qa_block(&questions, &answers), questions.len());
    let result = state
        .llm
        .generate_json::<Evaluation>(LlmRequest::new(prompt, prompts::GRADING_TEMPERATURE))
        .await;
    let evaluation = evaluation_from(result, questions.len());

    let raw_answers = serde_json::to_value(&answers)?;
    let submission = db::insert_submission(
        pool,
        assignment.id,
        user.user_id,
        &raw_answers,
        evaluation.total_marks,
        &evaluation.final_feedback,
    )
    .await?;
    tracing::info!(
        "Submission {} graded {} for assignment {}",
        submission.id,
        evaluation.total_marks,
        assignment.id
    );

    Ok(Json(EvaluationResponse {
        submission_id: submission.id,
        assignment_id: assignment.id,
        student_id: user.user_id,
        answers: evaluation.answers,
        total_marks: evaluation.total_marks,
        final_feedback: evaluation.final_feedback,
    }))
}

pub async fn student_view(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(assignment_id): Path<Uuid>,
) -> ApiResult<Json<SubmissionList>> {
    if user.role != Role::Student {
        return Err(BackendError::forbidden("Not authorized to view submissions"));
    }
    let submissions = db::submissions_of_student(state.pool()?, user.user_id, Some(assignment_id)).await?;
    if submissions.is_empty() {
        return Err(BackendError::not_found("No submissions found for this assignment"));
    }
    Ok(Json(SubmissionList { submissions }))
}

pub async fn assignment_stats(
    State(state): State<AppState>,
    AuthUser(_user): AuthUser,
    Path(assignment_id): Path<Uuid>,
) -> ApiResult<Json<AssignmentStats>> {
    let pool = state.pool()?;
    let assignment = db::get_assignment(pool, assignment_id)
        .await?
        .ok_or_else(|| BackendError::not_found("Assignment not found"))?;

    Ok(Json(AssignmentStats {
        assignment_id: assignment.id,
        group_id: assignment.group_id,
        total_students: member_count(pool, assignment.group_id).await?,
        students_completed: db::submission_count(pool, assignment.id).await?,
    }))
}

pub async fn assignment_marks(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(assignment_id): Path<Uuid>,
) -> ApiResult<Json<AssignmentMarks>> {
    if user.role != Role::Teacher {
        return Err(BackendError::forbidden("Not authorized"));
    }
    let pool = state.pool()?;
    let assignment = db::get_assignment(pool, assignment_id)
        .await?
        .ok_or_else(|| BackendError::not_found("Assignment not found"))?;

    Ok(Json(AssignmentMarks {
        assignment_id: assignment.id,
        group_id: assignment.group_id,
        students: db::marks_for_assignment(pool, assignment.id).await?,
    }))
}

pub async fn total_submissions(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> ApiResult<Json<TotalSubmissions>> {
    if user.role != Role::Teacher {
        return Err(BackendError::forbidden("Not authorized"));
    }
    let total = db::submission_count_for_owner(state.pool()?, user.user_id).await?;
    Ok(Json(TotalSubmissions {
        teacher_id: user.user_id,
        total_submissions: total,
    }))
}

pub async fn student_submission_stats(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> ApiResult<Json<CompletionStats>> {
    if user.role != Role::Student {
        return Err(BackendError::forbidden("Not authorized"));
    }
    let submissions = db::submissions_of_student(state.pool()?, user.user_id, None).await?;
    if submissions.is_empty() {
        return Err(BackendError::not_found("No submissions found for this student"));
    }

    let submitted: Vec<DateTime<Utc>> = submissions.iter().map(|s| s.submitted_at).collect();
    Ok(Json(CompletionStats {
        student_id: user.user_id,
        total_submissions: submissions.len(),
        completion_over_time: completion_over_time(&submitted),
    }))
}

pub async fn student_assignments(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> ApiResult<Json<StudentAssignments>> {
    if user.role != Role::Student {
        return Err(BackendError::forbidden("Only students can access this route"));
    }
    let pool = state.pool()?;

    let submitted: HashMap<Uuid, DateTime<Utc>> = db::submissions_of_student(pool, user.user_id, None)
        .await?
        .into_iter()
        .map(|s| (s.assignment_id, s.submitted_at))
        .collect();

    let now = Utc::now();
    let mut seen = HashSet::new();
    let assignments = db::group_assignments_for_member(pool, user.user_id)
        .await?
        .into_iter()
        .filter(|a| seen.insert(a.id))
        .map(|a| {
            let submitted_at = submitted.get(&a.id).copied();
            StudentAssignment {
                is_completed: submitted_at.is_some(),
                is_past_due: now > a.due_date,
                submitted_at,
                id: a.id,
                title: a.title,
                description: a.description,
                due_date: a.due_date,
                group_name: a.group_name,
            }
        })
        .collect();

    Ok(Json(StudentAssignments { assignments }))
}

pub async fn student_performance_stats(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> ApiResult<Json<PerformanceStats>> {
    if user.role != Role::Student {
        return Err(BackendError::forbidden("Only students can access this"));
    }
    let pool = state.pool()?;

    let submitted: Vec<DateTime<Utc>> = db::submissions_of_student(pool, user.user_id, None)
        .await?
        .iter()
        .map(|s| s.submitted_at)
        .collect();

    Ok(Json(PerformanceStats {
        grades_vs_assignments: db::grades_for_student(pool, user.user_id).await?,
        submission_count_per_month: submissions_per_month(&submitted),
    }))
}
