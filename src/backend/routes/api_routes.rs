/**
 * API Route Handlers
 *
 * Every REST endpoint, mounted under `/api`.
 *
 * # Authentication
 *
 * Only `/api/auth/register` and `/api/auth/login` are public. Everything else
 * sits behind `auth_middleware`, which answers 401 before the handler runs
 * when the session token is missing or invalid. Role checks (403) happen in
 * the handlers.
 */

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};

use crate::backend::assignments::{handlers as assignments, submissions};
use crate::backend::auth::{get_me, login, logout, register};
use crate::backend::groups::handlers as groups;
use crate::backend::middleware::auth_middleware;
use crate::backend::notes::handlers as notes;
use crate::backend::peer::handlers as peer;
use crate::backend::server::state::AppState;
use crate::backend::teach::handlers as teach;

/// Configure API routes
///
/// ## Auth
/// - `POST /api/auth/register`, `POST /api/auth/login` (public)
/// - `GET /api/auth/me`, `POST /api/auth/logout`, `GET /api/auth/student/notes`
///
/// ## Groups
/// - `/api/insights/create-teacher-insights`, `/api/insights/teacher-insights`
/// - `/api/groups/join`, `/api/groups/joined-or-not/{group_id}`, `/api/groups/view-students`
///
/// ## Notes, assignments, submissions
/// - `/api/notes/...`, `/api/assignments/...`, `/api/ai-evaluator/...`, `/api/submissions/...`
///
/// ## Sessions
/// - `/api/teach-sessions/...`, `/api/peer-learning/...`
pub fn configure_api_routes(app_state: AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login));

    let protected = Router::new()
        // Account
        .route("/auth/me", get(get_me))
        .route("/auth/logout", post(logout))
        .route("/auth/student/notes", get(notes::student_notes))
        // Groups
        .route("/insights/create-teacher-insights", post(groups::create_group))
        .route("/insights/teacher-insights", get(groups::list_groups))
        .route("/groups/join", post(groups::join_group))
        .route("/groups/joined-or-not/{group_id}", get(groups::joined_or_not))
        .route("/groups/view-students", get(groups::view_students))
        // Notes
        .route("/notes/create-note", post(notes::create_note))
        .route("/notes/teacher-get-notes", get(notes::teacher_notes))
        .route("/notes/notes-generates", post(notes::generate_notes))
        .route("/notes/edit-note/{note_id}", put(notes::edit_note))
        .route("/notes/delete-note/{note_id}", delete(notes::delete_note))
        .route("/notes/{note_id}", get(notes::get_note))
        // Assignments
        .route("/assignments/create-assignment", post(assignments::create_assignment))
        .route("/assignments/assignments", get(assignments::list_assignments))
        .route(
            "/assignments/get-assignment-viewById/{assignment_id}",
            get(assignments::get_assignment),
        )
        .route(
            "/assignments/delete-assignment/{assignment_id}",
            delete(assignments::delete_assignment),
        )
        .route(
            "/assignments/generate-question/{assignment_id}",
            post(assignments::generate_questions),
        )
        // Grading and submission stats
        .route("/ai-evaluator/{assignment_id}/evaluate", post(submissions::evaluate_answers))
        .route("/submissions/student-view/{assignment_id}", get(submissions::student_view))
        .route("/submissions/assignment-stats/{assignment_id}", get(submissions::assignment_stats))
        .route("/submissions/assignment-marks/{assignment_id}", get(submissions::assignment_marks))
        .route("/submissions/total-submissions", get(submissions::total_submissions))
        .route("/submissions/student-submissions-stats", get(submissions::student_submission_stats))
        .route("/submissions/student/assignments", get(submissions::student_assignments))
        .route("/submissions/student-performance-stats", get(submissions::student_performance_stats))
        // Teach sessions
        .route("/teach-sessions/sessions", post(teach::create_session).get(teach::list_sessions))
        .route(
            "/teach-sessions/sessions/{session_id}",
            get(teach::get_session).put(teach::update_session).delete(teach::delete_session),
        )
        .route("/teach-sessions/sessions/{session_id}/chat", post(teach::chat))
        .route("/teach-sessions/sessions/{session_id}/chat/stream", post(teach::chat_stream))
        .route(
            "/teach-sessions/sessions/{session_id}/whiteboard",
            post(teach::save_whiteboard).get(teach::list_whiteboards),
        )
        .route("/teach-sessions/sessions/{session_id}/evaluate", post(teach::evaluate))
        // Peer learning
        .route("/peer-learning/sessions", post(peer::create_session).get(peer::list_sessions))
        .route("/peer-learning/sessions/my-teachings", get(peer::my_teachings))
        .route(
            "/peer-learning/sessions/{session_id}",
            get(peer::get_session).delete(peer::delete_session),
        )
        .route("/peer-learning/sessions/{session_id}/enroll", post(peer::enroll))
        .route("/peer-learning/sessions/{session_id}/start", post(peer::start))
        .route("/peer-learning/sessions/{session_id}/end", post(peer::end))
        .route("/peer-learning/sessions/{session_id}/messages", get(peer::messages))
        .route("/peer-learning/sessions/{session_id}/chat", post(peer::chat))
        .route("/peer-learning/sessions/{session_id}/rate", post(peer::rate))
        .route(
            "/peer-learning/sessions/{session_id}/whiteboard",
            post(peer::save_whiteboard).get(peer::list_whiteboards),
        )
        .route("/peer-learning/stats", get(peer::stats))
        .route_layer(middleware::from_fn_with_state(app_state, auth_middleware));

    Router::new().nest("/api", public.merge(protected))
}
