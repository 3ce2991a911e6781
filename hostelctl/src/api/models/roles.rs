//! API request/response models for roles.

use super::permissions::PermissionResponse;
use crate::db::models::roles::RoleDBResponse;
use crate::types::{PermissionId, RoleId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Query parameters for listing roles
#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ListRolesQuery {
    pub is_active: Option<bool>,
}

/// Request body for creating a role. `code` is upper-cased.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RoleCreate {
    #[schema(example = "Warden")]
    pub name: String,
    #[schema(example = "WARDEN")]
    pub code: String,
    pub description: Option<String>,
    /// Every id must name an existing, active permission
    #[serde(default)]
    #[schema(value_type = Vec<String>)]
    pub permissions: Vec<PermissionId>,
}

/// Request body for updating a role. Omitted fields are left unchanged; a supplied
/// `permissions` list replaces the current one.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct RoleUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    #[schema(value_type = Option<Vec<String>>)]
    pub permissions: Option<Vec<PermissionId>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoleResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: RoleId,
    pub name: String,
    pub code: String,
    pub description: Option<String>,
    pub is_system_role: bool,
    pub is_active: bool,
    pub permissions: Vec<PermissionResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<RoleDBResponse> for RoleResponse {
    fn from(db: RoleDBResponse) -> Self {
        Self {
            id: db.id,
            name: db.name,
            code: db.code,
            description: db.description,
            is_system_role: db.is_system_role,
            is_active: db.lifecycle.is_active(),
            permissions: db.permissions.into_iter().map(PermissionResponse::from).collect(),
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}
