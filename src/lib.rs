//! CrossLearn - Main Library
//!
//! Backend for a classroom platform: accounts, groups, notes and assignments,
//! AI-assisted question generation and grading, "teach the AI" sessions, and
//! live peer-learning rooms with chat, whiteboard sync and WebRTC signaling.
//!
//! # Module Structure
//!
//! - **`shared`** - Types and rules with no I/O
//!   - Socket protocol, peer-session lifecycle, classroom records
//!   - Configuration and error types
//!
//! - **`backend`** - Server-side code (only compiled with `ssr` feature)
//!   - Axum HTTP server and WebSocket endpoint
//!   - Live session coordinator
//!   - Authentication, REST resources, LLM client
//!   - PostgreSQL persistence through sqlx
//!
//! # Feature Flags
//!
//! - **`ssr`** (default) - enables the `backend` module and the server binary
//!
//! # Usage
//!
//! ```rust,no_run
//! use crosslearn::backend::server::init::create_app;
//! use crosslearn::shared::AppConfig;
//!
//! # async fn example() {
//! let app = create_app(AppConfig::default()).await;
//! // Serve `app` with axum::serve
//! # }
//! ```
//!
//! # Thread Safety
//!
//! The live coordinator keeps its rooms behind a single `tokio::sync::RwLock`
//! and talks to each socket through an unbounded mpsc channel. Everything
//! else is stateless per request and shares a `PgPool`.

/// Shared types and data structures
pub mod shared;

/// Backend server-side code
#[cfg(feature = "ssr")]
pub mod backend;
