/**
 * User Model and Database Operations
 *
 * This module handles user records, including the coin counter that peer
 * sessions award and refund.
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::shared::classroom::Role;

const USER_COLUMNS: &str =
    "id, full_name, email, password_hash, role, image_url, coins, created_at, updated_at";

/// User struct representing a user in the database
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    /// Hashed password (bcrypt)
    #[serde(skip_serializing)]
    pub password_hash: String,
    #[sqlx(try_from = "String")]
    pub role: Role,
    pub image_url: Option<String>,
    pub coins: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Create a new user
pub async fn create_user(
    pool: &PgPool,
    full_name: &str,
    email: &str,
    password_hash: &str,
    role: Role,
) -> Result<User, sqlx::Error> {
    let now = Utc::now();
    let query = format!(
        r#"
        INSERT INTO users (id, full_name, email, password_hash, role, coins, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, 0, $6, $6)
        RETURNING {USER_COLUMNS}
        "#
    );
    sqlx::query_as::<_, User>(&query)
        .bind(Uuid::new_v4())
        .bind(full_name)
        .bind(email)
        .bind(password_hash)
        .bind(role.as_str())
        .bind(now)
        .fetch_one(pool)
        .await
}

/// Get user by email
pub async fn get_user_by_email(pool: &PgPool, email: &str) -> Result<Option<User>, sqlx::Error> {
    let query = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
    sqlx::query_as::<_, User>(&query).bind(email).fetch_optional(pool).await
}

/// Get user by ID
pub async fn get_user_by_id(pool: &PgPool, id: Uuid) -> Result<Option<User>, sqlx::Error> {
    let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
    sqlx::query_as::<_, User>(&query).bind(id).fetch_optional(pool).await
}

/// Add coins to a user's counter inside the caller's transaction.
pub async fn add_coins(conn: &mut PgConnection, user_id: Uuid, amount: i32) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE users SET coins = coins + $1, updated_at = NOW() WHERE id = $2")
        .bind(amount)
        .bind(user_id)
        .execute(conn)
        .await?;
    Ok(())
}

/// Current coin balance, locking the user row until the transaction ends.
pub async fn lock_coins(conn: &mut PgConnection, user_id: Uuid) -> Result<Option<i32>, sqlx::Error> {
    sqlx::query_scalar::<_, i32>("SELECT coins FROM users WHERE id = $1 FOR UPDATE")
        .bind(user_id)
        .fetch_optional(conn)
        .await
}

pub async fn set_coins(conn: &mut PgConnection, user_id: Uuid, coins: i32) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE users SET coins = $1, updated_at = NOW() WHERE id = $2")
        .bind(coins)
        .bind(user_id)
        .execute(conn)
        .await?;
    Ok(())
}
