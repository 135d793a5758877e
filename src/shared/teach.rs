//! Teach Sessions
//!
//! Solo sessions where a student explains a topic to an AI playing the learner.
//! The AI's evaluation scores feed peer-session qualification.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::shared::error::SharedError;

/// Number of recent messages replayed to the AI on every chat turn.
pub const HISTORY_WINDOW: i64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TeachStatus {
    Active,
    Paused,
    Completed,
}

impl TeachStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Completed => "completed",
        }
    }
}

impl TryFrom<String> for TeachStatus {
    type Error = SharedError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "active" => Ok(Self::Active),
            "paused" => Ok(Self::Paused),
            "completed" => Ok(Self::Completed),
            other => Err(SharedError::validation("status", format!("Unknown teach session status '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "ssr", derive(sqlx::FromRow))]
pub struct TeachSession {
    pub id: Uuid,
    pub student_id: Uuid,
    pub title: String,
    pub topic: String,
    #[cfg_attr(feature = "ssr", sqlx(try_from = "String"))]
    pub status: TeachStatus,
    pub duration_minutes: i32,
    pub ai_summary: Option<String>,
    pub clarity_score: Option<i32>,
    pub completeness_score: Option<i32>,
    pub feedback: Option<String>,
    pub reference_note_ids: Vec<Uuid>,
    pub reference_assignment_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewTeachSession {
    pub title: String,
    pub topic: String,
    #[serde(default)]
    pub reference_note_ids: Vec<Uuid>,
    #[serde(default)]
    pub reference_assignment_ids: Vec<Uuid>,
}

/// Partial update; absent fields are left alone
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TeachSessionUpdate {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub status: Option<TeachStatus>,
    #[serde(default)]
    pub duration_minutes: Option<i32>,
}

impl TeachSession {
    pub fn apply_update(&mut self, update: &TeachSessionUpdate, now: DateTime<Utc>) {
        if let Some(title) = &update.title {
            self.title = title.clone();
        }
        if let Some(duration) = update.duration_minutes {
            self.duration_minutes = duration.max(0);
        }
        if let Some(status) = update.status {
            if status == TeachStatus::Completed && self.completed_at.is_none() {
                self.completed_at = Some(now);
            }
            self.status = status;
        }
        self.updated_at = now;
    }

    pub fn apply_evaluation(&mut self, evaluation: &SessionEvaluation, now: DateTime<Utc>) {
        self.ai_summary = Some(evaluation.summary.clone());
        self.clarity_score = Some(evaluation.clarity_score);
        self.completeness_score = Some(evaluation.completeness_score);
        self.feedback = Some(evaluation.feedback.clone());
        self.status = TeachStatus::Completed;
        self.completed_at = Some(now);
        self.updated_at = now;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    Student,
    Ai,
}

impl Speaker {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Student => "student",
            Self::Ai => "ai",
        }
    }
}

impl TryFrom<String> for Speaker {
    type Error = SharedError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "student" => Ok(Self::Student),
            "ai" => Ok(Self::Ai),
            other => Err(SharedError::validation("role", format!("Unknown speaker '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "ssr", derive(sqlx::FromRow))]
pub struct TeachMessage {
    pub id: Uuid,
    pub session_id: Uuid,
    #[cfg_attr(feature = "ssr", sqlx(try_from = "String"))]
    pub role: Speaker,
    pub content: String,
    pub message_type: String,
    pub audio_duration: Option<i32>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default = "default_message_type")]
    pub message_type: String,
    #[serde(default)]
    pub audio_duration: Option<i32>,
    /// Base64 PNG of the whiteboard, forwarded to the model as inline image data.
    #[serde(default)]
    pub whiteboard_image: Option<String>,
}

pub fn default_message_type() -> String {
    "text".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatReply {
    pub ai_message: String,
    pub message_id: Uuid,
    pub session_id: Uuid,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EvaluationRequest {
    #[serde(default)]
    pub whiteboard_image: Option<String>,
}

/// The AI's assessment of a teach session
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionEvaluation {
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub clarity_score: i32,
    #[serde(default)]
    pub completeness_score: i32,
    #[serde(default)]
    pub feedback: String,
    #[serde(default)]
    pub areas_for_improvement: Vec<String>,
}

impl SessionEvaluation {
    pub fn unavailable() -> Self {
        Self {
            summary: String::new(),
            clarity_score: 0,
            completeness_score: 0,
            feedback: "Evaluation is unavailable right now. Please try again later.".to_string(),
            areas_for_improvement: Vec::new(),
        }
    }

    pub fn clamped(mut self) -> Self {
        self.clarity_score = self.clarity_score.clamp(0, 100);
        self.completeness_score = self.completeness_score.clamp(0, 100);
        self
    }
}

/// Saved whiteboard drawing, used by both teach and peer sessions
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "ssr", derive(sqlx::FromRow))]
pub struct WhiteboardSnapshot {
    pub id: Uuid,
    pub session_id: Uuid,
    pub drawing_data: Value,
    pub snapshot_url: Option<String>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewWhiteboardSnapshot {
    pub drawing_data: Value,
    #[serde(default)]
    pub snapshot_url: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Opening line the AI student posts when a session is created.
pub fn greeting(topic: &str) -> String {
    format!(
        "Hi! I'm your student for today. I'm excited to learn about {}! Can you start by giving me an overview of what we'll be covering?",
        topic
    )
}

/// Render messages (oldest first) as a transcript.
pub fn format_history(messages: &[TeachMessage]) -> String {
    messages
        .iter()
        .map(|m| {
            let speaker = match m.role {
                Speaker::Student => "Teacher",
                Speaker::Ai => "AI Student",
            };
            format!("{}: {}", speaker, m.content)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Reference material for the prompt: `(kind, title, body)` triples.
pub fn format_references<'a, I>(items: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str, &'a str)>,
{
    items
        .into_iter()
        .map(|(kind, title, body)| format!("{} - {}:\n{}\n", kind, title, body))
        .collect::<Vec<_>>()
        .join("\n---\n")
}
