//! Database models for users.

use crate::types::{Lifecycle, RoleId, UserId};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Database request for creating a new user
#[derive(Debug, Clone)]
pub struct UserCreateDBRequest {
    pub full_name: String,
    /// Lowercased before insert
    pub email: String,
    pub password_hash: String,
    pub role_id: RoleId,
    pub phone: Option<String>,
    pub lifecycle: Lifecycle,
    pub created_by: Option<UserId>,
}

/// Database request for updating a user
#[derive(Debug, Clone, Default)]
pub struct UserUpdateDBRequest {
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub role_id: Option<RoleId>,
    pub lifecycle: Option<Lifecycle>,
    pub password_hash: Option<String>,
}

/// Database response for a user, joined with its role's name and code
#[derive(Debug, Clone, FromRow)]
pub struct UserDBResponse {
    pub id: UserId,
    pub full_name: String,
    pub email: String,
    pub password_hash: String,
    pub role_id: RoleId,
    pub role_name: String,
    pub role_code: String,
    pub phone: Option<String>,
    pub lifecycle: Lifecycle,
    pub last_login: Option<DateTime<Utc>>,
    pub created_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
