/**
 * Authentication Handler Types
 *
 * Request and response bodies shared by the register, login, me and logout
 * handlers.
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::backend::auth::users::User;
use crate::shared::classroom::Role;
use crate::shared::SharedError;

/// Minimum password length accepted at registration
pub const MIN_PASSWORD_LEN: usize = 6;

/// Registration request
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct RegisterRequest {
    pub full_name: String,
    pub email: String,
    /// Plain password, hashed with bcrypt before storage
    pub password: String,
    #[serde(default)]
    pub role: Role,
}

impl RegisterRequest {
    pub fn validate(&self) -> Result<(), SharedError> {
        if self.full_name.trim().is_empty() {
            return Err(SharedError::validation("full_name", "Full name is required"));
        }
        let email = self.email.trim();
        if email.len() < 3 || !email.contains('@') {
            return Err(SharedError::validation("email", "A valid email is required"));
        }
        if self.password.len() < MIN_PASSWORD_LEN {
            return Err(SharedError::validation(
                "password",
                format!("Password must be at least {} characters", MIN_PASSWORD_LEN),
            ));
        }
        Ok(())
    }
}

/// Login request
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Returned by register and login. The token is also set as a cookie.
#[derive(Serialize, Debug)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserResponse,
}

/// User information that is safe to return to clients
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct UserResponse {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub role: Role,
    pub image_url: Option<String>,
    pub coins: i32,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            full_name: user.full_name,
            email: user.email,
            role: user.role,
            image_url: user.image_url,
            coins: user.coins,
            created_at: user.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn request(password: &str) -> RegisterRequest {
        RegisterRequest {
            full_name: "Ada Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            password: password.to_string(),
            role: Role::Student,
        }
    }

    #[test]
    fn test_register_validation() {
        assert!(request("secret").validate().is_ok());
        assert_matches!(
            request("short").validate(),
            Err(SharedError::ValidationError { field, .. }) if field == "password"
        );

        let mut bad_email = request("secret");
        bad_email.email = "not-an-email".to_string();
        assert!(bad_email.validate().is_err());
    }

    #[test]
    fn test_role_defaults_to_student() {
        let parsed: RegisterRequest =
            serde_json::from_str(r#"{"full_name":"A","email":"a@b.c","password":"123456"}"#).unwrap();
        assert_eq!(parsed.role, Role::Student);
    }
}
