//! Database models for roles.

use crate::db::models::permissions::PermissionDBResponse;
use crate::types::{Lifecycle, PermissionId, RoleId};
use chrono::{DateTime, Utc};

/// Database request for creating a role
#[derive(Debug, Clone)]
pub struct RoleCreateDBRequest {
    pub name: String,
    pub code: String,
    pub description: Option<String>,
    /// Stored in the given order
    pub permission_ids: Vec<PermissionId>,
    pub is_system_role: bool,
}

/// Database request for updating a role
#[derive(Debug, Clone, Default)]
pub struct RoleUpdateDBRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    /// Replaces the whole permission set when present
    pub permission_ids: Option<Vec<PermissionId>>,
    pub lifecycle: Option<Lifecycle>,
}

/// Database response for a role with its permissions expanded
#[derive(Debug, Clone)]
pub struct RoleDBResponse {
    pub id: RoleId,
    pub name: String,
    pub code: String,
    pub description: Option<String>,
    pub is_system_role: bool,
    pub lifecycle: Lifecycle,
    pub permissions: Vec<PermissionDBResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
