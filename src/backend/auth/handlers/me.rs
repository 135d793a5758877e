/**
 * Current User Handlers
 *
 * GET /api/auth/me and POST /api/auth/logout. Both sit behind the auth
 * middleware, so the user has already been loaded.
 */

use axum::{
    extract::State,
    http::header::SET_COOKIE,
    response::{IntoResponse, Json},
};

use crate::backend::auth::handlers::types::UserResponse;
use crate::backend::auth::sessions::cleared_cookie;
use crate::backend::auth::users::get_user_by_id;
use crate::backend::error::{ApiResult, BackendError};
use crate::backend::middleware::AuthUser;
use crate::backend::server::state::AppState;

/// Fresh copy of the caller's record, including role and coin balance.
pub async fn get_me(State(state): State<AppState>, AuthUser(user): AuthUser) -> ApiResult<Json<UserResponse>> {
    let pool = state.pool()?;
    let record = get_user_by_id(pool, user.user_id)
        .await?
        .ok_or_else(|| BackendError::unauthorized("Not authenticated"))?;
    Ok(Json(record.into()))
}

/// Expire the session cookie. Bearer tokens stay valid until they expire.
pub async fn logout(State(state): State<AppState>, AuthUser(user): AuthUser) -> ApiResult<impl IntoResponse> {
    let pool = state.pool()?;
    let record = get_user_by_id(pool, user.user_id)
        .await?
        .ok_or_else(|| BackendError::unauthorized("Not authenticated"))?;
    tracing::info!("User logged out: {}", record.email);
    Ok(([(SET_COOKIE, cleared_cookie())], Json(UserResponse::from(record))))
}
