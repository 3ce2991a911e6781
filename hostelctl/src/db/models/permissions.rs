//! Database models for the permission registry.

use crate::types::{Lifecycle, PermissionId, PermissionKey};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Database request for creating a permission
#[derive(Debug, Clone)]
pub struct PermissionCreateDBRequest {
    pub name: String,
    pub key: PermissionKey,
    pub module: String,
    pub description: Option<String>,
}

/// Database request for updating a permission. The key is immutable.
#[derive(Debug, Clone, Default)]
pub struct PermissionUpdateDBRequest {
    pub name: Option<String>,
    pub module: Option<String>,
    pub description: Option<String>,
    pub lifecycle: Option<Lifecycle>,
}

/// Database response for a permission
#[derive(Debug, Clone, FromRow)]
pub struct PermissionDBResponse {
    pub id: PermissionId,
    pub name: String,
    pub key: PermissionKey,
    pub module: String,
    pub description: Option<String>,
    pub lifecycle: Lifecycle,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
