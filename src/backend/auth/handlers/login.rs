/**
 * Login Handler
 *
 * POST /api/auth/login
 *
 * # Authentication Process
 *
 * 1. Look up user by email
 * 2. Verify password using bcrypt
 * 3. Generate JWT token
 * 4. Return token and user info, and set the session cookie
 *
 * Unknown emails and wrong passwords get the same `Invalid credentials` answer.
 */

use axum::{
    extract::State,
    http::header::SET_COOKIE,
    response::{IntoResponse, Json},
};
use bcrypt::verify;

use crate::backend::auth::handlers::types::{AuthResponse, LoginRequest};
use crate::backend::auth::sessions::session_cookie;
use crate::backend::auth::users::get_user_by_email;
use crate::backend::error::{ApiResult, BackendError};
use crate::backend::server::state::AppState;

pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    let pool = state.pool()?;
    let email = request.email.trim().to_lowercase();
    tracing::info!("Login request for: {}", email);

    let user = get_user_by_email(pool, &email).await?.ok_or_else(|| {
        tracing::warn!("User not found: {}", email);
        BackendError::bad_request("Invalid credentials")
    })?;

    let valid = verify(&request.password, &user.password_hash).map_err(|e| {
        tracing::error!("Password verification error: {:?}", e);
        BackendError::state("Password verification failed")
    })?;
    if !valid {
        tracing::warn!("Invalid password for user: {}", email);
        return Err(BackendError::bad_request("Invalid credentials"));
    }

    let token = state.tokens.issue(user.id, &user.email).map_err(|e| {
        tracing::error!("Failed to create token: {:?}", e);
        BackendError::state("Failed to create token")
    })?;

    tracing::info!("User logged in successfully: {}", user.email);

    let cookie = session_cookie(&token, state.tokens.ttl_days());
    Ok((
        [(SET_COOKIE, cookie)],
        Json(AuthResponse {
            token,
            user: user.into(),
        }),
    ))
}
