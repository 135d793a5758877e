//! Authentication Module
//!
//! User accounts, password hashing and JWT sessions.
//!
//! # Module Structure
//!
//! ```text
//! auth/
//! ├── mod.rs          - Module exports and documentation
//! ├── users.rs        - User model and database operations
//! ├── sessions.rs     - JWT tokens and cookie helpers
//! └── handlers/       - HTTP handlers
//! ```
//!
//! # Authentication Flow
//!
//! 1. **Register**: name, email, password and role → user created → token returned and set as cookie
//! 2. **Login**: email and password → credentials verified → token returned and set as cookie
//! 3. **Protected routes**: token read from the `access_token` cookie or a Bearer header
//!
//! # Security
//!
//! - Passwords are hashed using bcrypt before storage
//! - Tokens are HS256 JWTs whose `sub` is the user id
//! - Tokens expire after `auth.token_ttl_days` (15 by default)
//! - Unknown email and wrong password produce the same error

/// User data model and database operations
pub mod users;

/// JWT token generation and validation
pub mod sessions;

/// HTTP handlers for authentication endpoints
pub mod handlers;

pub use handlers::{get_me, login, logout, register};
pub use handlers::types::{AuthResponse, LoginRequest, RegisterRequest, UserResponse};
