//! Backend Module
//!
//! All server-side code: the Axum HTTP server, the live session coordinator
//! behind `/socket`, the REST resources and their PostgreSQL persistence.
//!
//! This module is only compiled when the `ssr` feature is enabled.
//!
//! # Architecture
//!
//! - **`server`** - Application state, configuration loading, app creation
//! - **`routes`** - Router assembly
//! - **`live`** - Live session coordinator and the WebSocket handler
//! - **`auth`** - Users, bcrypt passwords, JWT sessions
//! - **`middleware`** - Authentication middleware and the `AuthUser` extractor
//! - **`groups`**, **`notes`**, **`assignments`**, **`teach`**, **`peer`** - REST resources
//! - **`ai`** - LLM client, prompts and output parsing
//! - **`error`** - Backend-specific error types
//!
//! # Module Structure
//!
//! ```text
//! backend/
//! ├── mod.rs          - Module exports and documentation
//! ├── main.rs         - Server binary
//! ├── server/         - Server initialization and state
//! ├── routes/         - Route configuration
//! ├── live/           - Live coordinator and socket handler
//! ├── auth/           - Authentication
//! ├── middleware/     - Request middleware
//! ├── groups/         - Groups and membership
//! ├── notes/          - Notes
//! ├── assignments/    - Assignments, grading, submissions
//! ├── teach/          - Teach sessions with the AI student
//! ├── peer/           - Peer learning sessions
//! ├── ai/             - LLM access
//! └── error/          - Error types
//! ```
//!
//! # State Management
//!
//! Handlers share one `AppState`: the optional `PgPool`, the live coordinator,
//! the LLM client, token keys and the loaded configuration. Only the
//! coordinator holds mutable in-memory state, behind a single `RwLock`.
//!
//! # Error Handling
//!
//! Handlers return `ApiResult<T>`; `BackendError` turns into a JSON body with
//! the matching status code.

/// Server setup and configuration
pub mod server;

/// Route configuration
pub mod routes;

/// Live session coordinator and WebSocket endpoint
pub mod live;

/// Backend error types
pub mod error;

/// Authentication and user management
pub mod auth;

/// Middleware for request processing
pub mod middleware;

/// Groups and membership
pub mod groups;

/// Teacher notes
pub mod notes;

/// Assignments, grading and submissions
pub mod assignments;

/// Teach sessions with the AI student
pub mod teach;

/// Peer learning sessions
pub mod peer;

/// LLM client
pub mod ai;

/// Re-export commonly used types
pub use server::create_app;
pub use live::LiveCoordinator;
pub use error::BackendError;
