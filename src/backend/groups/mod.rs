//! Groups Module
//!
//! Teacher-owned groups and their student membership.

pub mod db;
pub mod handlers;
