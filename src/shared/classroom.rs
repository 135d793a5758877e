/**
 * Classroom Records
 *
 * Groups, notes, assignments and submissions, along with the request bodies the
 * REST API accepts for them and the small access rules that do not need a
 * database to decide.
 */
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::shared::error::SharedError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    Student,
    Teacher,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Student => "student",
            Self::Teacher => "teacher",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = SharedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "student" => Ok(Self::Student),
            "teacher" => Ok(Self::Teacher),
            other => Err(SharedError::validation("role", format!("Unknown role '{}'", other))),
        }
    }
}

impl TryFrom<String> for Role {
    type Error = SharedError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Fails with the standard "Only {role}s can perform this action" message.
pub fn require_role(actual: Role, required: Role) -> Result<(), SharedError> {
    if actual != required {
        return Err(SharedError::permission(format!(
            "Only {}s can perform this action",
            required
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "ssr", derive(sqlx::FromRow))]
pub struct Group {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub group_name: String,
    pub group_des: String,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewGroup {
    pub group_name: String,
    pub group_des: String,
    #[serde(default)]
    pub image_url: Option<String>,
}

impl NewGroup {
    pub fn validate(&self) -> Result<(), SharedError> {
        if self.group_name.trim().is_empty() {
            return Err(SharedError::validation("group_name", "Group name is required"));
        }
        Ok(())
    }
}

/// Public profile of a group member
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "ssr", derive(sqlx::FromRow))]
pub struct MemberProfile {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "ssr", derive(sqlx::FromRow))]
pub struct Note {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub owner_id: Uuid,
    pub group_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewNote {
    pub title: String,
    pub content: String,
}

impl NewNote {
    pub fn validate(&self) -> Result<(), SharedError> {
        if self.title.trim().is_empty() {
            return Err(SharedError::validation("title", "Title is required"));
        }
        if self.content.trim().is_empty() {
            return Err(SharedError::validation("content", "Content is required"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NoteEdit {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "ssr", derive(sqlx::FromRow))]
pub struct Assignment {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub due_date: DateTime<Utc>,
    pub owner_id: Uuid,
    pub group_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Assignment {
    pub fn is_past_due(&self, now: DateTime<Utc>) -> bool {
        now > self.due_date
    }

    /// Who may open the assignment.
    ///
    /// Teachers see only their own assignments. Students must belong to the
    /// assignment's group and lose access once the due date has passed.
    pub fn check_view(
        &self,
        viewer: Uuid,
        role: Role,
        is_group_member: bool,
        now: DateTime<Utc>,
    ) -> Result<(), SharedError> {
        match role {
            Role::Teacher if self.owner_id != viewer => {
                Err(SharedError::permission("not authorized to view this assignment"))
            }
            Role::Teacher => Ok(()),
            Role::Student if self.is_past_due(now) => {
                Err(SharedError::permission("The due date for this assignment has passed."))
            }
            Role::Student if !is_group_member => {
                Err(SharedError::permission("not authorized to view this assignment"))
            }
            Role::Student => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewAssignment {
    pub title: String,
    pub description: String,
    pub due_date: DateTime<Utc>,
}

impl NewAssignment {
    pub fn validate(&self) -> Result<(), SharedError> {
        if self.title.trim().is_empty() || self.description.trim().is_empty() {
            return Err(SharedError::validation("title", "missing required fields"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    Theory,
    Coding,
}

/// One generated assignment question
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Question {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: QuestionKind,
    pub question: String,
}

/// Marks available per question when grading.
pub const MARKS_PER_QUESTION: i32 = 5;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "ssr", derive(sqlx::FromRow))]
pub struct Submission {
    pub id: Uuid,
    pub assignment_id: Uuid,
    pub student_id: Uuid,
    pub answers: Value,
    pub grade: Option<i32>,
    pub feedback: Option<String>,
    pub submitted_at: DateTime<Utc>,
}

/// Grading result returned by the evaluator
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Evaluation {
    #[serde(default)]
    pub answers: Vec<Value>,
    #[serde(default)]
    pub total_marks: i32,
    #[serde(default = "default_feedback")]
    pub final_feedback: String,
}

fn default_feedback() -> String {
    "No feedback.".to_string()
}

impl Evaluation {
    /// Placeholder used when the grader answered with something that is not JSON.
    pub fn invalid_format() -> Self {
        Self {
            answers: Vec::new(),
            total_marks: 0,
            final_feedback: "Invalid AI response format.".to_string(),
        }
    }

    /// Placeholder used when the grader could not be reached.
    pub fn internal_error() -> Self {
        Self {
            answers: Vec::new(),
            total_marks: 0,
            final_feedback: "An internal evaluation error occurred.".to_string(),
        }
    }

    /// Clamp the awarded marks to what the questions allow.
    pub fn clamped(mut self, question_count: usize) -> Self {
        let max = question_count as i32 * MARKS_PER_QUESTION;
        self.total_marks = self.total_marks.clamp(0, max);
        self
    }
}

/// Number of submissions per calendar day, oldest first
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DailyCount {
    pub date: NaiveDate,
    pub count: usize,
}

pub fn completion_over_time(submitted: &[DateTime<Utc>]) -> Vec<DailyCount> {
    let mut days: BTreeMap<NaiveDate, usize> = BTreeMap::new();
    for at in submitted {
        *days.entry(at.date_naive()).or_default() += 1;
    }
    days.into_iter().map(|(date, count)| DailyCount { date, count }).collect()
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MonthlyCount {
    pub month: &'static str,
    pub count: usize,
}

const MONTH_NAMES: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Submissions grouped by calendar month (across years), January first.
pub fn submissions_per_month(submitted: &[DateTime<Utc>]) -> Vec<MonthlyCount> {
    let mut months = [0usize; 12];
    for at in submitted {
        months[at.month0() as usize] += 1;
    }
    months
        .iter()
        .enumerate()
        .filter(|(_, count)| **count > 0)
        .map(|(index, count)| MonthlyCount {
            month: MONTH_NAMES[index],
            count: *count,
        })
        .collect()
}
