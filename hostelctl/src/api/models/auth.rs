//! API request/response models for logging in and creating staff accounts.

use crate::types::{RoleId, UserId};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Request body for logging in
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginRequest {
    #[schema(example = "warden@hostel.example.com")]
    pub email: String,
    pub password: String,
}

/// Request body for an administrator creating a staff account
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    #[schema(example = "Ayesha Khan")]
    pub full_name: String,
    pub email: String,
    pub password: String,
    #[schema(value_type = String, format = "uuid")]
    pub role_id: RoleId,
    pub phone: Option<String>,
    /// Defaults to active
    pub is_active: Option<bool>,
}

/// The user summary returned alongside a session token
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginUser {
    #[schema(value_type = String, format = "uuid")]
    pub id: UserId,
    pub full_name: String,
    pub email: String,
    /// Role code
    pub role: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    /// Send as `Authorization: Bearer <token>`
    pub token: String,
    pub user: LoginUser,
}
