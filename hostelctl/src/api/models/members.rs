//! API request/response models for hostel members (residents).

use crate::db::models::members::{MemberDBResponse, MemberStatus};
use crate::types::{BedId, MemberId, RoomId, UserId};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Query parameters for listing members. Soft-deleted members are never listed.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ListMembersQuery {
    pub status: Option<MemberStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MemberCreate {
    #[schema(example = "M-2024-001")]
    pub member_code: String,
    pub full_name: String,
    #[schema(example = "35202-1234567-1")]
    pub cnic: String,
    pub phone: String,
    pub guardian_name: String,
    pub guardian_phone: Option<String>,
    pub institute_name: Option<String>,
    pub address: Option<String>,
    /// Defaults to today
    pub join_date: Option<NaiveDate>,
}

/// Profile fields only. Residency status and placement have their own endpoints.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MemberUpdate {
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub guardian_name: Option<String>,
    pub guardian_phone: Option<String>,
    pub institute_name: Option<String>,
    pub address: Option<String>,
    pub join_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MemberStatusUpdate {
    pub status: MemberStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MemberResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: MemberId,
    pub member_code: String,
    pub full_name: String,
    pub cnic: String,
    pub phone: String,
    pub guardian_name: String,
    pub guardian_phone: Option<String>,
    pub institute_name: Option<String>,
    pub address: Option<String>,
    pub join_date: NaiveDate,
    pub leave_date: Option<NaiveDate>,
    pub status: MemberStatus,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub current_bed_id: Option<BedId>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub current_room_id: Option<RoomId>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub created_by: Option<UserId>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<MemberDBResponse> for MemberResponse {
    fn from(db: MemberDBResponse) -> Self {
        Self {
            id: db.id,
            member_code: db.member_code,
            full_name: db.full_name,
            cnic: db.cnic,
            phone: db.phone,
            guardian_name: db.guardian_name,
            guardian_phone: db.guardian_phone,
            institute_name: db.institute_name,
            address: db.address,
            join_date: db.join_date,
            leave_date: db.leave_date,
            status: db.status,
            current_bed_id: db.current_bed_id,
            current_room_id: db.current_room_id,
            created_by: db.created_by,
            is_active: db.lifecycle.is_active(),
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}
