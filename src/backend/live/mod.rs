//! Live Module
//!
//! Real-time peer-learning rooms: chat fan-out, whiteboard sync and WebRTC
//! signaling over a WebSocket.
//!
//! ```text
//! live/
//! ├── mod.rs         - Module exports
//! ├── coordinator.rs - In-memory rooms and event fan-out
//! └── handler.rs     - /socket upgrade and per-socket loops
//! ```

pub mod coordinator;
pub mod handler;

pub use coordinator::{BoundUser, ConnectionId, LiveCoordinator, LiveError};
pub use handler::socket_handler;
