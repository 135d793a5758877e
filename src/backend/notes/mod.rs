//! Notes Module
//!
//! Teacher notes published to groups, plus LLM-generated study notes.

pub mod db;
pub mod handlers;
