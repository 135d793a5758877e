//! Teach Sessions Module
//!
//! Solo sessions where a student teaches an AI learner.

pub mod db;
pub mod handlers;
