//! Peer Learning Module
//!
//! Student-taught sessions: persistence and REST handlers. The real-time side
//! (chat relay, whiteboard sync, WebRTC signaling) lives in `backend::live`.

pub mod db;
pub mod handlers;
