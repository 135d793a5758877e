//! Assignment, question-set and submission queries

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::shared::classroom::{Assignment, NewAssignment, Question, Submission};

const ASSIGNMENT_COLUMNS: &str = "id, title, description, due_date, owner_id, group_id, created_at, updated_at";
const SUBMISSION_COLUMNS: &str = "id, assignment_id, student_id, answers, grade, feedback, submitted_at";

/// Stored question set of an assignment (at most one per assignment)
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct QuestionSet {
    pub id: Uuid,
    pub assignment_id: Uuid,
    pub questions: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One graded submission with the student's profile
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct StudentMark {
    pub student_id: Uuid,
    pub student_name: String,
    pub student_email: String,
    pub student_image_url: Option<String>,
    pub grade: Option<i32>,
    pub feedback: Option<String>,
}

/// An assignment from a student's groups
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct GroupAssignment {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub due_date: DateTime<Utc>,
    pub group_name: Option<String>,
}

/// A student's grade with the assignment title
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct GradedAssignment {
    pub assignment_title: String,
    pub grade: i32,
}

pub async fn create_assignment(
    pool: &PgPool,
    owner_id: Uuid,
    group_id: Uuid,
    assignment: &NewAssignment,
) -> Result<Assignment, sqlx::Error> {
    let query = format!(
        r#"
        INSERT INTO assignments (id, title, description, due_date, owner_id, group_id, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, NOW(), NOW())
        RETURNING {ASSIGNMENT_COLUMNS}
        "#
    );
    sqlx::query_as::<_, Assignment>(&query)
        .bind(Uuid::new_v4())
        .bind(assignment.title.trim())
        .bind(&assignment.description)
        .bind(assignment.due_date)
        .bind(owner_id)
        .bind(group_id)
        .fetch_one(pool)
        .await
}

pub async fn get_assignment(pool: &PgPool, id: Uuid) -> Result<Option<Assignment>, sqlx::Error> {
    let query = format!("SELECT {ASSIGNMENT_COLUMNS} FROM assignments WHERE id = $1");
    sqlx::query_as::<_, Assignment>(&query).bind(id).fetch_optional(pool).await
}

pub async fn assignments_by_owner(pool: &PgPool, owner_id: Uuid) -> Result<Vec<Assignment>, sqlx::Error> {
    let query = format!("SELECT {ASSIGNMENT_COLUMNS} FROM assignments WHERE owner_id = $1 ORDER BY created_at DESC");
    sqlx::query_as::<_, Assignment>(&query).bind(owner_id).fetch_all(pool).await
}

/// Assignments of every group the student belongs to, newest first.
pub async fn assignments_for_member(pool: &PgPool, user_id: Uuid) -> Result<Vec<Assignment>, sqlx::Error> {
    sqlx::query_as::<_, Assignment>(
        r#"
        SELECT a.id, a.title, a.description, a.due_date, a.owner_id, a.group_id, a.created_at, a.updated_at
        FROM assignments a
        JOIN group_members m ON m.group_id = a.group_id
        WHERE m.user_id = $1
        ORDER BY a.created_at DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
}

pub async fn assignments_by_ids(pool: &PgPool, ids: &[Uuid]) -> Result<Vec<Assignment>, sqlx::Error> {
    let query = format!("SELECT {ASSIGNMENT_COLUMNS} FROM assignments WHERE id = ANY($1)");
    sqlx::query_as::<_, Assignment>(&query).bind(ids).fetch_all(pool).await
}

/// Delete an assignment owned by `owner_id`, returning it.
pub async fn delete_assignment(pool: &PgPool, id: Uuid, owner_id: Uuid) -> Result<Option<Assignment>, sqlx::Error> {
    let query = format!("DELETE FROM assignments WHERE id = $1 AND owner_id = $2 RETURNING {ASSIGNMENT_COLUMNS}");
    sqlx::query_as::<_, Assignment>(&query)
        .bind(id)
        .bind(owner_id)
        .fetch_optional(pool)
        .await
}

pub async fn get_question_set(pool: &PgPool, assignment_id: Uuid) -> Result<Option<QuestionSet>, sqlx::Error> {
    sqlx::query_as::<_, QuestionSet>(
        "SELECT id, assignment_id, questions, created_at, updated_at FROM assignment_questions WHERE assignment_id = $1",
    )
    .bind(assignment_id)
    .fetch_optional(pool)
    .await
}

pub async fn insert_question_set(
    pool: &PgPool,
    assignment_id: Uuid,
    questions: &[Question],
) -> Result<QuestionSet, sqlx::Error> {
    sqlx::query_as::<_, QuestionSet>(
        r#"
        INSERT INTO assignment_questions (id, assignment_id, questions, created_at, updated_at)
        VALUES ($1, $2, $3, NOW(), NOW())
        RETURNING id, assignment_id, questions, created_at, updated_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(assignment_id)
    .bind(sqlx::types::Json(questions))
    .fetch_one(pool)
    .await
}

pub async fn has_submitted(pool: &PgPool, assignment_id: Uuid, student_id: Uuid) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM submissions WHERE assignment_id = $1 AND student_id = $2)",
    )
    .bind(assignment_id)
    .bind(student_id)
    .fetch_one(pool)
    .await
}

pub async fn insert_submission(
    pool: &PgPool,
    assignment_id: Uuid,
    student_id: Uuid,
    answers: &Value,
    grade: i32,
    feedback: &str,
) -> Result<Submission, sqlx::Error> {
    let query = format!(
        r#"
        INSERT INTO submissions (id, assignment_id, student_id, answers, grade, feedback, submitted_at)
        VALUES ($1, $2, $3, $4, $5, $6, NOW())
        RETURNING {SUBMISSION_COLUMNS}
        "#
    );
    sqlx::query_as::<_, Submission>(&query)
        .bind(Uuid::new_v4())
        .bind(assignment_id)
        .bind(student_id)
        .bind(answers)
        .bind(grade)
        .bind(feedback)
        .fetch_one(pool)
        .await
}

pub async fn submissions_of_student(
    pool: &PgPool,
    student_id: Uuid,
    assignment_id: Option<Uuid>,
) -> Result<Vec<Submission>, sqlx::Error> {
    let query = format!(
        r#"
        SELECT {SUBMISSION_COLUMNS} FROM submissions
        WHERE student_id = $1 AND ($2::uuid IS NULL OR assignment_id = $2)
        ORDER BY submitted_at
        "#
    );
    sqlx::query_as::<_, Submission>(&query)
        .bind(student_id)
        .bind(assignment_id)
        .fetch_all(pool)
        .await
}

pub async fn submission_count(pool: &PgPool, assignment_id: Uuid) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM submissions WHERE assignment_id = $1")
        .bind(assignment_id)
        .fetch_one(pool)
        .await
}

/// Submissions to every assignment the teacher owns.
pub async fn submission_count_for_owner(pool: &PgPool, owner_id: Uuid) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*) FROM submissions s
        JOIN assignments a ON a.id = s.assignment_id
        WHERE a.owner_id = $1
        "#,
    )
    .bind(owner_id)
    .fetch_one(pool)
    .await
}

pub async fn marks_for_assignment(pool: &PgPool, assignment_id: Uuid) -> Result<Vec<StudentMark>, sqlx::Error> {
    sqlx::query_as::<_, StudentMark>(
        r#"
        SELECT u.id AS student_id, u.full_name AS student_name, u.email AS student_email,
               u.image_url AS student_image_url, s.grade, s.feedback
        FROM submissions s
        JOIN users u ON u.id = s.student_id
        WHERE s.assignment_id = $1
        ORDER BY s.submitted_at
        "#,
    )
    .bind(assignment_id)
    .fetch_all(pool)
    .await
}

/// Assignments of the student's groups with the group name, latest due date first.
pub async fn group_assignments_for_member(pool: &PgPool, user_id: Uuid) -> Result<Vec<GroupAssignment>, sqlx::Error> {
    sqlx::query_as::<_, GroupAssignment>(
        r#"
        SELECT a.id, a.title, a.description, a.due_date, g.group_name
        FROM assignments a
        JOIN group_members m ON m.group_id = a.group_id
        LEFT JOIN groups g ON g.id = a.group_id
        WHERE m.user_id = $1
        ORDER BY a.due_date DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
}

pub async fn grades_for_student(pool: &PgPool, student_id: Uuid) -> Result<Vec<GradedAssignment>, sqlx::Error> {
    sqlx::query_as::<_, GradedAssignment>(
        r#"
        SELECT a.title AS assignment_title, COALESCE(s.grade, 0) AS grade
        FROM submissions s
        JOIN assignments a ON a.id = s.assignment_id
        WHERE s.student_id = $1
        ORDER BY s.submitted_at
        "#,
    )
    .bind(student_id)
    .fetch_all(pool)
    .await
}
