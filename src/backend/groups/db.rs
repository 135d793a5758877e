//! Group queries

use sqlx::PgPool;
use uuid::Uuid;

use crate::shared::classroom::{Group, MemberProfile, NewGroup, Role};

const GROUP_COLUMNS: &str = "id, owner_id, group_name, group_des, image_url, created_at, updated_at";

pub async fn create_group(pool: &PgPool, owner_id: Uuid, group: &NewGroup) -> Result<Group, sqlx::Error> {
    let query = format!(
        r#"
        INSERT INTO groups (id, owner_id, group_name, group_des, image_url, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, NOW(), NOW())
        RETURNING {GROUP_COLUMNS}
        "#
    );
    sqlx::query_as::<_, Group>(&query)
        .bind(Uuid::new_v4())
        .bind(owner_id)
        .bind(group.group_name.trim())
        .bind(&group.group_des)
        .bind(&group.image_url)
        .fetch_one(pool)
        .await
}

/// Every group, newest first.
pub async fn list_groups(pool: &PgPool) -> Result<Vec<Group>, sqlx::Error> {
    let query = format!("SELECT {GROUP_COLUMNS} FROM groups ORDER BY created_at DESC");
    sqlx::query_as::<_, Group>(&query).fetch_all(pool).await
}

pub async fn get_group(pool: &PgPool, id: Uuid) -> Result<Option<Group>, sqlx::Error> {
    let query = format!("SELECT {GROUP_COLUMNS} FROM groups WHERE id = $1");
    sqlx::query_as::<_, Group>(&query).bind(id).fetch_optional(pool).await
}

pub async fn groups_owned_by(pool: &PgPool, owner_id: Uuid) -> Result<Vec<Group>, sqlx::Error> {
    let query = format!("SELECT {GROUP_COLUMNS} FROM groups WHERE owner_id = $1 ORDER BY created_at");
    sqlx::query_as::<_, Group>(&query).bind(owner_id).fetch_all(pool).await
}

/// The teacher's first group, which new notes and assignments attach to.
pub async fn first_group_of(pool: &PgPool, owner_id: Uuid) -> Result<Option<Group>, sqlx::Error> {
    let query = format!("SELECT {GROUP_COLUMNS} FROM groups WHERE owner_id = $1 ORDER BY created_at LIMIT 1");
    sqlx::query_as::<_, Group>(&query).bind(owner_id).fetch_optional(pool).await
}

pub async fn is_member(pool: &PgPool, group_id: Uuid, user_id: Uuid) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM group_members WHERE group_id = $1 AND user_id = $2)",
    )
    .bind(group_id)
    .bind(user_id)
    .fetch_one(pool)
    .await
}

pub async fn add_member(pool: &PgPool, group_id: Uuid, user_id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO group_members (group_id, user_id) VALUES ($1, $2)")
        .bind(group_id)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Groups the user has joined.
pub async fn joined_group_ids(pool: &PgPool, user_id: Uuid) -> Result<Vec<Uuid>, sqlx::Error> {
    sqlx::query_scalar::<_, Uuid>("SELECT group_id FROM group_members WHERE user_id = $1")
        .bind(user_id)
        .fetch_all(pool)
        .await
}

/// Student members of a group, by name.
pub async fn student_members(pool: &PgPool, group_id: Uuid) -> Result<Vec<MemberProfile>, sqlx::Error> {
    sqlx::query_as::<_, MemberProfile>(
        r#"
        SELECT u.id, u.full_name, u.email, u.image_url
        FROM group_members m
        JOIN users u ON u.id = m.user_id
        WHERE m.group_id = $1 AND u.role = $2
        ORDER BY u.full_name
        "#,
    )
    .bind(group_id)
    .bind(Role::Student.as_str())
    .fetch_all(pool)
    .await
}

pub async fn member_count(pool: &PgPool, group_id: Uuid) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM group_members WHERE group_id = $1")
        .bind(group_id)
        .fetch_one(pool)
        .await
}
