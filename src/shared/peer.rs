//! Peer Learning Sessions
//!
//! A qualified student ("peer teacher") opens a session that other students
//! enroll in. This module holds the lifecycle rules so they can be applied to a
//! row that the server has locked, and tested without a database.
//!
//! # Lifecycle
//!
//! ```text
//! waiting --(first enrollment | start)--> active --(end)--> completed
//! ```
//!
//! A session may only be deleted while it is still `waiting`. Ending a session
//! awards the teacher [`COINS_PER_STUDENT`] coins per enrolled student.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::shared::error::SharedError;

/// Best teach-session score (percent) required to open a peer session.
pub const MIN_SCORE_THRESHOLD: f64 = 80.0;
/// Coins awarded to the teacher for each enrolled student when a session ends.
pub const COINS_PER_STUDENT: i32 = 10;
pub const DEFAULT_MAX_STUDENTS: i32 = 5;
pub const MAX_STUDENTS_LIMIT: i32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Waiting,
    Active,
    Completed,
    Cancelled,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Sessions that still show up in the public listing.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Waiting | Self::Active)
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SessionStatus {
    type Err = SharedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "waiting" => Ok(Self::Waiting),
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(SharedError::validation("status", format!("Unknown session status '{}'", other))),
        }
    }
}

impl TryFrom<String> for SessionStatus {
    type Error = SharedError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Role of a message sender within a peer session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SenderRole {
    Teacher,
    Student,
}

impl SenderRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Teacher => "teacher",
            Self::Student => "student",
        }
    }
}

impl TryFrom<String> for SenderRole {
    type Error = SharedError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "teacher" => Ok(Self::Teacher),
            "student" => Ok(Self::Student),
            other => Err(SharedError::validation("sender_role", format!("Unknown sender role '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "ssr", derive(sqlx::FromRow))]
pub struct PeerSession {
    pub id: Uuid,
    pub teacher_user_id: Uuid,
    pub title: String,
    pub topic: String,
    pub description: Option<String>,
    #[cfg_attr(feature = "ssr", sqlx(try_from = "String"))]
    pub status: SessionStatus,
    pub max_students: i32,
    pub teacher_best_score: Option<i32>,
    pub average_rating: f64,
    pub total_ratings: i32,
    pub upvotes: i32,
    pub coins_earned: i32,
    pub enrolled_student_ids: Vec<Uuid>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request body for opening a peer session
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewPeerSession {
    pub title: String,
    pub topic: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_max_students")]
    pub max_students: i32,
    #[serde(default)]
    pub scheduled_at: Option<DateTime<Utc>>,
}

fn default_max_students() -> i32 {
    DEFAULT_MAX_STUDENTS
}

/// What an enrollment changed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnrollOutcome {
    /// The enrollment moved the session from waiting to active.
    pub activated: bool,
}

/// Best average of clarity and completeness over completed teach sessions.
///
/// Sessions missing either score are ignored. Returns 0 when nothing qualifies.
pub fn best_teach_score<I>(scores: I) -> f64
where
    I: IntoIterator<Item = (Option<i32>, Option<i32>)>,
{
    scores
        .into_iter()
        .filter_map(|(clarity, completeness)| match (clarity, completeness) {
            (Some(c), Some(p)) => Some((c + p) as f64 / 2.0),
            _ => None,
        })
        .fold(0.0, f64::max)
}

pub fn check_qualification(best_score: f64) -> Result<(), SharedError> {
    if best_score < MIN_SCORE_THRESHOLD {
        return Err(SharedError::validation(
            "teacher_best_score",
            format!(
                "You need at least one teach session with {}%+ score to create a peer learning session. Your best score: {:.1}%",
                MIN_SCORE_THRESHOLD, best_score
            ),
        ));
    }
    Ok(())
}

pub fn validate_max_students(max_students: i32) -> Result<i32, SharedError> {
    if !(1..=MAX_STUDENTS_LIMIT).contains(&max_students) {
        return Err(SharedError::validation(
            "max_students",
            format!("Max students must be between 1 and {}", MAX_STUDENTS_LIMIT),
        ));
    }
    Ok(max_students)
}

pub fn validate_rating(rating: i32) -> Result<i32, SharedError> {
    if !(1..=5).contains(&rating) {
        return Err(SharedError::validation("rating", "Rating must be between 1 and 5"));
    }
    Ok(rating)
}

impl PeerSession {
    /// Open a new session for a qualified teacher.
    pub fn open(
        teacher_user_id: Uuid,
        request: &NewPeerSession,
        best_score: f64,
        now: DateTime<Utc>,
    ) -> Result<Self, SharedError> {
        check_qualification(best_score)?;
        let max_students = validate_max_students(request.max_students)?;
        if request.title.trim().is_empty() || request.topic.trim().is_empty() {
            return Err(SharedError::validation("title", "Title and topic are required"));
        }

        Ok(Self {
            id: Uuid::new_v4(),
            teacher_user_id,
            title: request.title.trim().to_string(),
            topic: request.topic.trim().to_string(),
            description: request.description.clone(),
            status: SessionStatus::Waiting,
            max_students,
            teacher_best_score: Some(best_score as i32),
            average_rating: 0.0,
            total_ratings: 0,
            upvotes: 0,
            coins_earned: 0,
            enrolled_student_ids: Vec::new(),
            scheduled_at: request.scheduled_at,
            started_at: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn enrolled_count(&self) -> usize {
        self.enrolled_student_ids.len()
    }

    pub fn is_full(&self) -> bool {
        self.enrolled_count() >= self.max_students.max(0) as usize
    }

    pub fn is_enrolled(&self, user_id: Uuid) -> bool {
        self.enrolled_student_ids.contains(&user_id)
    }

    /// The role `user_id` plays in this session, if any.
    pub fn role_of(&self, user_id: Uuid) -> Option<SenderRole> {
        if self.teacher_user_id == user_id {
            Some(SenderRole::Teacher)
        } else if self.is_enrolled(user_id) {
            Some(SenderRole::Student)
        } else {
            None
        }
    }

    pub fn require_participant(&self, user_id: Uuid) -> Result<SenderRole, SharedError> {
        self.role_of(user_id)
            .ok_or_else(|| SharedError::permission("You are not a participant in this session"))
    }

    pub fn enroll(&mut self, student_id: Uuid, now: DateTime<Utc>) -> Result<EnrollOutcome, SharedError> {
        if !self.status.is_open() {
            return Err(SharedError::lifecycle("Session is not accepting enrollments"));
        }
        if self.teacher_user_id == student_id {
            return Err(SharedError::lifecycle("You cannot enroll in your own session"));
        }
        if self.is_enrolled(student_id) {
            return Err(SharedError::lifecycle("You are already enrolled in this session"));
        }
        if self.is_full() {
            return Err(SharedError::lifecycle("Session is full"));
        }

        self.enrolled_student_ids.push(student_id);
        self.updated_at = now;

        let activated = self.enrolled_student_ids.len() == 1 && self.status == SessionStatus::Waiting;
        if activated {
            self.status = SessionStatus::Active;
            self.started_at = Some(now);
        }
        Ok(EnrollOutcome { activated })
    }

    pub fn start(&mut self, actor: Uuid, now: DateTime<Utc>) -> Result<(), SharedError> {
        if self.teacher_user_id != actor {
            return Err(SharedError::permission("Only the teacher can start this session"));
        }
        if self.status != SessionStatus::Waiting {
            return Err(SharedError::lifecycle("Session is not in waiting state"));
        }
        if self.enrolled_student_ids.is_empty() {
            return Err(SharedError::lifecycle("No students enrolled yet"));
        }
        self.status = SessionStatus::Active;
        self.started_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Complete the session and return the coins awarded to the teacher.
    pub fn end(&mut self, actor: Uuid, now: DateTime<Utc>) -> Result<i32, SharedError> {
        if self.teacher_user_id != actor {
            return Err(SharedError::permission("Only the teacher can end this session"));
        }
        if self.status != SessionStatus::Active {
            return Err(SharedError::lifecycle("Session is not currently active"));
        }
        let coins = self.enrolled_count() as i32 * COINS_PER_STUDENT;
        self.status = SessionStatus::Completed;
        self.completed_at = Some(now);
        self.coins_earned = coins;
        self.updated_at = now;
        Ok(coins)
    }

    pub fn ensure_deletable(&self) -> Result<(), SharedError> {
        if self.status != SessionStatus::Waiting {
            return Err(SharedError::lifecycle("Cannot delete a session that has started"));
        }
        Ok(())
    }

    /// Teacher coin balance after taking back this session's award, floored at zero.
    pub fn refunded_balance(&self, current_coins: i32) -> i32 {
        (current_coins - self.coins_earned).max(0)
    }

    pub fn require_rater(&self, user_id: Uuid) -> Result<(), SharedError> {
        if !self.is_enrolled(user_id) {
            return Err(SharedError::permission("Only enrolled students can rate this session"));
        }
        Ok(())
    }

    pub fn apply_ratings(&mut self, summary: RatingSummary) {
        self.average_rating = summary.average_rating;
        self.total_ratings = summary.total_ratings;
        self.upvotes = summary.upvotes;
    }
}

/// Aggregate over the latest rating of every student
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RatingSummary {
    pub average_rating: f64,
    pub total_ratings: i32,
    pub upvotes: i32,
}

impl RatingSummary {
    pub fn from_ratings<I>(ratings: I) -> Self
    where
        I: IntoIterator<Item = (i32, bool)>,
    {
        let (mut total, mut sum, mut upvotes) = (0i32, 0i64, 0i32);
        for (rating, upvoted) in ratings {
            total += 1;
            sum += rating as i64;
            if upvoted {
                upvotes += 1;
            }
        }
        let average_rating = if total > 0 { sum as f64 / total as f64 } else { 0.0 };
        Self {
            average_rating,
            total_ratings: total,
            upvotes,
        }
    }
}

/// Peer-teaching statistics for one teacher
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeachingStats {
    pub total_sessions_taught: usize,
    pub total_coins_earned: i64,
    pub average_rating: f64,
    pub total_students_taught: usize,
}

impl TeachingStats {
    pub fn from_sessions(sessions: &[PeerSession]) -> Self {
        let rated: Vec<f64> = sessions
            .iter()
            .filter(|s| s.total_ratings > 0)
            .map(|s| s.average_rating)
            .collect();
        let average_rating = if rated.is_empty() {
            0.0
        } else {
            rated.iter().sum::<f64>() / rated.len() as f64
        };

        Self {
            total_sessions_taught: sessions.len(),
            total_coins_earned: sessions.iter().map(|s| s.coins_earned as i64).sum(),
            average_rating,
            total_students_taught: sessions.iter().map(|s| s.enrolled_count()).sum(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    fn request(max_students: i32) -> NewPeerSession {
        NewPeerSession {
            title: "Recursion".to_string(),
            topic: "Algorithms".to_string(),
            description: None,
            max_students,
            scheduled_at: None,
        }
    }

    fn open_session(max_students: i32) -> (PeerSession, Uuid) {
        let teacher = Uuid::new_v4();
        let session = PeerSession::open(teacher, &request(max_students), 85.0, Utc::now()).unwrap();
        (session, teacher)
    }

    #[test]
    fn test_best_teach_score_skips_incomplete() {
        let best = best_teach_score(vec![(Some(70), Some(90)), (Some(100), None), (Some(95), Some(80))]);
        assert_eq!(best, 87.5);
        assert_eq!(best_teach_score(Vec::new()), 0.0);
    }

    #[test]
    fn test_open_requires_qualification() {
        let err = PeerSession::open(Uuid::new_v4(), &request(5), 79.5, Utc::now()).unwrap_err();
        assert!(err.to_string().contains("Your best score: 79.5%"));
    }

    #[test]
    fn test_open_validates_capacity() {
        assert_matches!(
            PeerSession::open(Uuid::new_v4(), &request(0), 90.0, Utc::now()),
            Err(SharedError::ValidationError { .. })
        );
        assert_matches!(
            PeerSession::open(Uuid::new_v4(), &request(11), 90.0, Utc::now()),
            Err(SharedError::ValidationError { .. })
        );
        let (session, _) = open_session(10);
        assert_eq!(session.status, SessionStatus::Waiting);
        assert_eq!(session.teacher_best_score, Some(85));
    }

    #[test]
    fn test_first_enrollment_activates() {
        let (mut session, _) = open_session(3);
        let outcome = session.enroll(Uuid::new_v4(), Utc::now()).unwrap();
        assert!(outcome.activated);
        assert_eq!(session.status, SessionStatus::Active);
        assert!(session.started_at.is_some());

        let outcome = session.enroll(Uuid::new_v4(), Utc::now()).unwrap();
        assert!(!outcome.activated);
    }

    #[test]
    fn test_enrollment_rejections() {
        let (mut session, teacher) = open_session(1);
        assert_eq!(
            session.enroll(teacher, Utc::now()).unwrap_err().to_string(),
            "You cannot enroll in your own session"
        );

        let student = Uuid::new_v4();
        session.enroll(student, Utc::now()).unwrap();
        assert_eq!(
            session.enroll(student, Utc::now()).unwrap_err().to_string(),
            "You are already enrolled in this session"
        );
        assert_eq!(session.enroll(Uuid::new_v4(), Utc::now()).unwrap_err().to_string(), "Session is full");

        session.end(teacher, Utc::now()).unwrap();
        assert_eq!(
            session.enroll(Uuid::new_v4(), Utc::now()).unwrap_err().to_string(),
            "Session is not accepting enrollments"
        );
    }

    #[test]
    fn test_start_rules() {
        let (mut session, teacher) = open_session(5);
        assert_matches!(session.start(Uuid::new_v4(), Utc::now()), Err(SharedError::PermissionError { .. }));
        assert_eq!(session.start(teacher, Utc::now()).unwrap_err().to_string(), "No students enrolled yet");

        session.enroll(Uuid::new_v4(), Utc::now()).unwrap();
        assert_eq!(
            session.start(teacher, Utc::now()).unwrap_err().to_string(),
            "Session is not in waiting state"
        );
    }

    #[test]
    fn test_end_awards_coins() {
        let (mut session, teacher) = open_session(5);
        assert_matches!(session.end(teacher, Utc::now()), Err(SharedError::LifecycleError { .. }));

        for _ in 0..3 {
            session.enroll(Uuid::new_v4(), Utc::now()).unwrap();
        }
        assert_matches!(session.end(Uuid::new_v4(), Utc::now()), Err(SharedError::PermissionError { .. }));
        assert_eq!(session.end(teacher, Utc::now()).unwrap(), 30);
        assert_eq!(session.status, SessionStatus::Completed);
        assert_eq!(session.coins_earned, 30);
        assert!(session.completed_at.is_some());
    }

    #[test]
    fn test_delete_only_while_waiting() {
        let (mut session, _) = open_session(5);
        assert!(session.ensure_deletable().is_ok());
        session.enroll(Uuid::new_v4(), Utc::now()).unwrap();
        assert!(session.ensure_deletable().is_err());
    }

    #[test]
    fn test_refund_floors_at_zero() {
        let (mut session, _) = open_session(5);
        session.coins_earned = 40;
        assert_eq!(session.refunded_balance(100), 60);
        assert_eq!(session.refunded_balance(15), 0);
    }

    #[test]
    fn test_roles() {
        let (mut session, teacher) = open_session(5);
        let student = Uuid::new_v4();
        session.enroll(student, Utc::now()).unwrap();
        assert_eq!(session.role_of(teacher), Some(SenderRole::Teacher));
        assert_eq!(session.role_of(student), Some(SenderRole::Student));
        assert!(session.require_participant(Uuid::new_v4()).is_err());
        assert!(session.require_rater(teacher).is_err());
        assert!(session.require_rater(student).is_ok());
    }

    #[test]
    fn test_rating_summary() {
        let summary = RatingSummary::from_ratings(vec![(5, true), (4, false), (3, true)]);
        assert_eq!(summary.total_ratings, 3);
        assert_eq!(summary.upvotes, 2);
        assert_eq!(summary.average_rating, 4.0);
        assert_eq!(RatingSummary::from_ratings(Vec::new()).average_rating, 0.0);
        assert!(validate_rating(0).is_err());
        assert!(validate_rating(6).is_err());
    }

    #[test]
    fn test_teaching_stats() {
        let (mut a, teacher) = open_session(5);
        a.enroll(Uuid::new_v4(), Utc::now()).unwrap();
        a.enroll(Uuid::new_v4(), Utc::now()).unwrap();
        a.end(teacher, Utc::now()).unwrap();
        a.apply_ratings(RatingSummary::from_ratings(vec![(4, false), (5, true)]));
        let (b, _) = open_session(5);

        let stats = TeachingStats::from_sessions(&[a, b]);
        assert_eq!(stats.total_sessions_taught, 2);
        assert_eq!(stats.total_coins_earned, 20);
        assert_eq!(stats.total_students_taught, 2);
        assert_eq!(stats.average_rating, 4.5);
    }

    #[test]
    fn test_status_round_trip_from_str() {
        for status in [SessionStatus::Waiting, SessionStatus::Active, SessionStatus::Completed, SessionStatus::Cancelled] {
            assert_eq!(status.as_str().parse::<SessionStatus>().unwrap(), status);
        }
        assert!("paused".parse::<SessionStatus>().is_err());
    }
}
