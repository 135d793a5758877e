/**
 * Register Handler
 *
 * POST /api/auth/register
 *
 * # Registration Process
 *
 * 1. Validate name, email and password length
 * 2. Reject an email that is already registered
 * 3. Hash the password with bcrypt
 * 4. Create the user and issue a JWT
 * 5. Return the token and set it as the `access_token` cookie
 */

use axum::{
    extract::State,
    http::header::SET_COOKIE,
    response::{IntoResponse, Json},
};
use bcrypt::{hash, DEFAULT_COST};

use crate::backend::auth::handlers::types::{AuthResponse, RegisterRequest};
use crate::backend::auth::sessions::session_cookie;
use crate::backend::auth::users::{create_user, get_user_by_email};
use crate::backend::error::{ApiResult, BackendError};
use crate::backend::server::state::AppState;

/// Register handler
///
/// # Errors
///
/// * `400 Bad Request` - invalid input or email already registered
/// * `503 Service Unavailable` - database not configured
/// * `500 Internal Server Error` - hashing, token or database failure
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> ApiResult<impl IntoResponse> {
    let pool = state.pool()?;
    request.validate()?;
    let email = request.email.trim().to_lowercase();

    tracing::info!("Registration request for: {}", email);

    if get_user_by_email(pool, &email).await?.is_some() {
        tracing::warn!("Email already registered: {}", email);
        return Err(BackendError::bad_request("Email already registered"));
    }

    let password_hash = hash(&request.password, DEFAULT_COST).map_err(|e| {
        tracing::error!("Failed to hash password: {:?}", e);
        BackendError::state("Failed to hash password")
    })?;

    let user = create_user(pool, request.full_name.trim(), &email, &password_hash, request.role).await?;

    let token = state.tokens.issue(user.id, &user.email).map_err(|e| {
        tracing::error!("Failed to create token: {:?}", e);
        BackendError::state("Failed to create token")
    })?;

    tracing::info!("User registered: {} ({})", user.email, user.role);

    let cookie = session_cookie(&token, state.tokens.ttl_days());
    Ok((
        [(SET_COOKIE, cookie)],
        Json(AuthResponse {
            token,
            user: user.into(),
        }),
    ))
}
