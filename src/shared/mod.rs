//! Shared Module
//!
//! Platform-agnostic types and rules used by the server and by tests: the live
//! socket protocol, the peer-session lifecycle, classroom records, teach
//! sessions, configuration and error types. Nothing in here touches the
//! network or the database.

/// Live session socket protocol
pub mod event;

/// Shared error types
pub mod error;

/// Application configuration
pub mod config;

/// Peer-learning session lifecycle
pub mod peer;

/// Groups, notes, assignments and submissions
pub mod classroom;

/// Teach sessions with the AI student
pub mod teach;

/// Re-export commonly used types for convenience
pub use event::{ClientEvent, ClientFrame, ServerEvent, ParticipantInfo};
pub use error::SharedError;
pub use config::{AppConfig, AppConfigBuilder, ConfigError};
pub use peer::{PeerSession, SessionStatus};
pub use classroom::Role;
