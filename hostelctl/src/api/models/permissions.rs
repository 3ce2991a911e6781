//! API request/response models for the permission registry.

use crate::db::models::permissions::PermissionDBResponse;
use crate::types::{PermissionId, PermissionKey};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Query parameters for listing permissions
#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ListPermissionsQuery {
    /// Only permissions in this module, e.g. `room`
    pub module: Option<String>,
    pub is_active: Option<bool>,
}

/// Request body for registering a permission.
///
/// `key` is upper-cased before it is parsed, and must name a known [`PermissionKey`].
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PermissionCreate {
    #[schema(example = "Create Room")]
    pub name: String,
    #[schema(example = "ROOM_CREATE")]
    pub key: String,
    #[schema(example = "room")]
    pub module: String,
    pub description: Option<String>,
}

/// Request body for editing a permission. The key itself is immutable.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct PermissionUpdate {
    pub name: Option<String>,
    pub module: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PermissionResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: PermissionId,
    pub name: String,
    pub key: PermissionKey,
    pub module: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<PermissionDBResponse> for PermissionResponse {
    fn from(db: PermissionDBResponse) -> Self {
        Self {
            id: db.id,
            name: db.name,
            key: db.key,
            module: db.module,
            description: db.description,
            is_active: db.lifecycle.is_active(),
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}
