/**
 * Authentication Middleware
 *
 * This module protects routes that require a signed-in user. It reads the
 * session token (cookie or Bearer header), verifies it, loads the user and
 * attaches an `AuthenticatedUser` to the request extensions for handlers.
 */

use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::backend::auth::sessions::token_from_headers;
use crate::backend::auth::users::get_user_by_id;
use crate::backend::error::BackendError;
use crate::backend::server::state::AppState;
use crate::shared::classroom::{require_role, Role};

/// Authenticated user data loaded from the token's subject
#[derive(Clone, Debug, PartialEq)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub email: String,
    pub full_name: String,
    pub role: Role,
}

impl AuthenticatedUser {
    /// 403 unless the user has `role`.
    pub fn require_role(&self, role: Role) -> Result<(), BackendError> {
        require_role(self.role, role).map_err(|e| {
            tracing::warn!("User {} rejected: {}", self.user_id, e);
            BackendError::from(e)
        })
    }
}

/// Authentication middleware
///
/// 1. Extracts the token from the `access_token` cookie or `Authorization: Bearer`
/// 2. Verifies the token
/// 3. Loads the user named by the `sub` claim
/// 4. Attaches the user to request extensions
///
/// Returns 401 if the token is missing or invalid or the user no longer
/// exists, and 503 if the database is not configured.
pub async fn auth_middleware(
    State(app_state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, BackendError> {
    let token = token_from_headers(request.headers()).ok_or_else(|| {
        tracing::warn!("Missing session token");
        BackendError::unauthorized("Not authenticated")
    })?;

    let claims = app_state.tokens.verify(&token).map_err(|e| {
        tracing::warn!("Invalid token: {:?}", e);
        BackendError::unauthorized("Not authenticated")
    })?;

    let user_id = Uuid::parse_str(&claims.sub).map_err(|e| {
        tracing::warn!("Invalid user ID in token: {:?}", e);
        BackendError::unauthorized("Not authenticated")
    })?;

    let pool = app_state.pool()?;
    let user = get_user_by_id(pool, user_id).await?.ok_or_else(|| {
        tracing::warn!("User from token no longer exists: {}", user_id);
        BackendError::unauthorized("Not authenticated")
    })?;

    request.extensions_mut().insert(AuthenticatedUser {
        user_id: user.id,
        email: user.email,
        full_name: user.full_name,
        role: user.role,
    });

    Ok(next.run(request).await)
}

/// Axum extractor for the user attached by [`auth_middleware`]
#[derive(Clone, Debug)]
pub struct AuthUser(pub AuthenticatedUser);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = BackendError;

    async fn from_request_parts(parts: &mut Parts, _state: &AppState) -> Result<Self, Self::Rejection> {
        let user = parts.extensions.get::<AuthenticatedUser>().cloned().ok_or_else(|| {
            tracing::warn!("AuthenticatedUser not found in request extensions");
            BackendError::unauthorized("Not authenticated")
        })?;
        Ok(AuthUser(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{Request as HttpRequest, StatusCode};
    use crate::shared::AppConfig;

    fn user(role: Role) -> AuthenticatedUser {
        AuthenticatedUser {
            user_id: Uuid::new_v4(),
            email: "test@example.com".to_string(),
            full_name: "Test User".to_string(),
            role,
        }
    }

    #[tokio::test]
    async fn test_extractor_reads_extensions() {
        let state = AppState::new(AppConfig::default(), None);
        let expected = user(Role::Teacher);
        let request = HttpRequest::builder().uri("/").extension(expected.clone()).body(()).unwrap();
        let (mut parts, _) = request.into_parts();

        let AuthUser(found) = AuthUser::from_request_parts(&mut parts, &state).await.unwrap();
        assert_eq!(found, expected);
    }

    #[tokio::test]
    async fn test_extractor_rejects_missing_user() {
        let state = AppState::new(AppConfig::default(), None);
        let (mut parts, _) = HttpRequest::builder().uri("/").body(()).unwrap().into_parts();

        let err = AuthUser::from_request_parts(&mut parts, &state).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_require_role() {
        assert!(user(Role::Teacher).require_role(Role::Teacher).is_ok());
        let err = user(Role::Student).require_role(Role::Teacher).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(err.message(), "Only teachers can perform this action");
    }
}
