//! Assignments Module
//!
//! Assignments, their generated question sets, graded submissions and the
//! submission statistics.
//!
//! ```text
//! assignments/
//! ├── mod.rs         - Module exports
//! ├── db.rs          - sqlx queries
//! ├── handlers.rs    - Assignment CRUD and question generation
//! └── submissions.rs - Grading and submission statistics
//! ```

pub mod db;
pub mod handlers;
pub mod submissions;
