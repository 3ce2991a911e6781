//! API request/response models for staff users.

use crate::db::handlers::users::AuthContext;
use crate::db::models::users::UserDBResponse;
use crate::types::{PermissionKey, RoleId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use utoipa::{IntoParams, ToSchema};

/// The authenticated caller, re-loaded from the store on every request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentUser {
    pub id: UserId,
    pub full_name: String,
    pub email: String,
    pub role_id: RoleId,
    pub role_code: String,
    /// Flattened keys of the caller's role, active permissions only
    pub permissions: HashSet<PermissionKey>,
}

impl From<AuthContext> for CurrentUser {
    fn from(context: AuthContext) -> Self {
        Self {
            id: context.user.id,
            full_name: context.user.full_name,
            email: context.user.email,
            role_id: context.user.role_id,
            role_code: context.user.role_code,
            permissions: context.permissions.into_iter().collect(),
        }
    }
}

/// Query parameters for listing users
#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ListUsersQuery {
    /// Only users in this state
    pub is_active: Option<bool>,
    /// Only users holding this role
    #[param(value_type = Option<String>, format = "uuid")]
    pub role_id: Option<RoleId>,
}

/// Request body for updating a user. Email and password are not editable here.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserUpdate {
    pub full_name: Option<String>,
    pub phone: Option<String>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub role_id: Option<RoleId>,
}

/// The role a user holds, as embedded in user responses
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserRole {
    #[schema(value_type = String, format = "uuid")]
    pub id: RoleId,
    pub name: String,
    pub code: String,
}

/// User details returned by the API. The password hash never leaves the store.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: UserId,
    pub full_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub role: UserRole,
    pub is_active: bool,
    pub last_login: Option<DateTime<Utc>>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub created_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<UserDBResponse> for UserResponse {
    fn from(db: UserDBResponse) -> Self {
        Self {
            id: db.id,
            full_name: db.full_name,
            email: db.email,
            phone: db.phone,
            role: UserRole {
                id: db.role_id,
                name: db.role_name,
                code: db.role_code,
            },
            is_active: db.lifecycle.is_active(),
            last_login: db.last_login,
            created_by: db.created_by,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

/// The caller's own profile, with the keys their role grants
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    #[serde(flatten)]
    pub user: UserResponse,
    pub permissions: Vec<PermissionKey>,
}
