//! Database models for members (residents).

use crate::types::{BedId, Lifecycle, MemberId, RoomId, UserId};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MemberStatus {
    Active,
    OnLeave,
    Left,
}

/// Database request for creating a member
#[derive(Debug, Clone)]
pub struct MemberCreateDBRequest {
    pub member_code: String,
    pub full_name: String,
    pub cnic: String,
    pub phone: String,
    pub guardian_name: String,
    pub guardian_phone: Option<String>,
    pub institute_name: Option<String>,
    pub address: Option<String>,
    /// Defaults to today when absent
    pub join_date: Option<NaiveDate>,
    pub created_by: Option<UserId>,
}

/// Database request for updating a member's profile fields
#[derive(Debug, Clone, Default)]
pub struct MemberUpdateDBRequest {
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub guardian_name: Option<String>,
    pub guardian_phone: Option<String>,
    pub institute_name: Option<String>,
    pub address: Option<String>,
    pub join_date: Option<NaiveDate>,
    pub lifecycle: Option<Lifecycle>,
}

/// Database response for a member
#[derive(Debug, Clone, FromRow)]
pub struct MemberDBResponse {
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
    pub current_bed_id: Option<BedId>,
    pub current_room_id: Option<RoomId>,
    pub created_by: Option<UserId>,
    pub lifecycle: Lifecycle,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
