/**
 * Group Handlers
 *
 * Teachers create groups; students join them. Notes and assignments are
 * published to a group and are visible to its members.
 *
 * # Routes
 *
 * - `POST /api/insights/create-teacher-insights` - create a group (teacher)
 * - `GET /api/insights/teacher-insights` - every group, newest first
 * - `POST /api/groups/join` - join a group (student)
 * - `GET /api/groups/joined-or-not/{group_id}` - membership check (student)
 * - `GET /api/groups/view-students` - the teacher's groups with their students
 */

use axum::{
    extract::{Path, State},
    response::Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::backend::auth::users::get_user_by_id;
use crate::backend::error::{ApiResult, BackendError};
use crate::backend::groups::db;
use crate::backend::middleware::AuthUser;
use crate::backend::server::state::AppState;
use crate::shared::classroom::{Group, MemberProfile, NewGroup, Role};

#[derive(Debug, Deserialize)]
pub struct JoinGroupRequest {
    pub group_id: Uuid,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct MembershipResponse {
    pub group_id: Uuid,
    pub joined: bool,
}

/// A teacher's group with its student roster
#[derive(Debug, Serialize)]
pub struct GroupRoster {
    pub id: Uuid,
    pub group_name: String,
    pub group_des: String,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub owner: MemberProfile,
    pub members: Vec<MemberProfile>,
    pub students_count: usize,
}

pub async fn create_group(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(request): Json<NewGroup>,
) -> ApiResult<Json<Group>> {
    user.require_role(Role::Teacher)?;
    request.validate()?;
    let pool = state.pool()?;

    let group = db::create_group(pool, user.user_id, &request).await?;
    tracing::info!("Group {} created by {}", group.id, user.user_id);
    Ok(Json(group))
}

pub async fn list_groups(State(state): State<AppState>, AuthUser(_user): AuthUser) -> ApiResult<Json<Vec<Group>>> {
    let groups = db::list_groups(state.pool()?).await?;
    if groups.is_empty() {
        return Err(BackendError::not_found("Not create any group yet"));
    }
    Ok(Json(groups))
}

pub async fn join_group(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(request): Json<JoinGroupRequest>,
) -> ApiResult<Json<Group>> {
    user.require_role(Role::Student)?;
    let pool = state.pool()?;

    let group = db::get_group(pool, request.group_id)
        .await?
        .ok_or_else(|| BackendError::not_found("Group not found."))?;
    if db::is_member(pool, group.id, user.user_id).await? {
        return Err(BackendError::bad_request("User already in group."));
    }

    db::add_member(pool, group.id, user.user_id).await?;
    tracing::info!("User {} joined group {}", user.user_id, group.id);
    Ok(Json(group))
}

pub async fn joined_or_not(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(group_id): Path<Uuid>,
) -> ApiResult<Json<MembershipResponse>> {
    user.require_role(Role::Student)?;
    let pool = state.pool()?;

    if db::get_group(pool, group_id).await?.is_none() {
        return Err(BackendError::not_found("Group not found."));
    }
    let joined = db::is_member(pool, group_id, user.user_id).await?;
    Ok(Json(MembershipResponse { group_id, joined }))
}

pub async fn view_students(State(state): State<AppState>, AuthUser(user): AuthUser) -> ApiResult<Json<Vec<GroupRoster>>> {
    user.require_role(Role::Teacher)?;
    let pool = state.pool()?;

    let owner = get_user_by_id(pool, user.user_id)
        .await?
        .map(|u| MemberProfile {
            id: u.id,
            full_name: u.full_name,
            email: u.email,
            image_url: u.image_url,
        })
        .ok_or_else(|| BackendError::unauthorized("Not authenticated"))?;

    let mut rosters = Vec::new();
    for group in db::groups_owned_by(pool, user.user_id).await? {
        let members = db::student_members(pool, group.id).await?;
        rosters.push(GroupRoster {
            id: group.id,
            group_name: group.group_name,
            group_des: group.group_des,
            image_url: group.image_url,
            created_at: group.created_at,
            updated_at: group.updated_at,
            owner: owner.clone(),
            students_count: members.len(),
            members,
        });
    }
    Ok(Json(rosters))
}
