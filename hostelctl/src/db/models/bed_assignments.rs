//! Database models for bed assignments.

use crate::types::{BedAssignmentId, BedId, MemberId, RoomId, UserId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum AssignmentStatus {
    Active,
    Closed,
}

/// Database request for creating an assignment. `rent_at_assignment` is copied from the room.
#[derive(Debug, Clone)]
pub struct BedAssignmentCreateDBRequest {
    pub member_id: MemberId,
    pub bed_id: BedId,
    pub room_id: RoomId,
    pub rent_at_assignment: Decimal,
    pub billable: bool,
    pub remarks: Option<String>,
    pub assigned_by: Option<UserId>,
}

/// Database request for updating an assignment
#[derive(Debug, Clone, Default)]
pub struct BedAssignmentUpdateDBRequest {
    pub remarks: Option<String>,
    pub billable: Option<bool>,
}

/// Database response for an assignment, joined with display fields of what it binds
#[derive(Debug, Clone, FromRow)]
pub struct BedAssignmentDBResponse {
    pub id: BedAssignmentId,
    pub member_id: MemberId,
    pub member_name: String,
    pub member_code: String,
    pub bed_id: BedId,
    pub bed_number: String,
    pub room_id: RoomId,
    pub room_number: String,
    pub rent_at_assignment: Decimal,
    pub status: AssignmentStatus,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub billable: bool,
    pub remarks: Option<String>,
    pub assigned_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
