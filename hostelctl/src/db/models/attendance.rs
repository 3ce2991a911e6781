//! Database models for attendance.

use crate::types::{AttendanceId, BedId, Lifecycle, MemberId, RoomId, UserId};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Leave,
}

/// One mark; applied as an upsert keyed by (member, date)
#[derive(Debug, Clone)]
pub struct AttendanceUpsertDBRequest {
    pub member_id: MemberId,
    pub room_id: Option<RoomId>,
    pub bed_id: Option<BedId>,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    pub remarks: Option<String>,
    pub marked_by: Option<UserId>,
}

#[derive(Debug, Clone, FromRow)]
pub struct AttendanceDBResponse {
    pub id: AttendanceId,
    pub member_id: MemberId,
    pub member_name: String,
    pub room_id: Option<RoomId>,
    pub bed_id: Option<BedId>,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    pub remarks: Option<String>,
    pub marked_by: Option<UserId>,
    pub lifecycle: Lifecycle,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One line of the daily sheet: an active assignment joined with that day's mark, if any.
///
/// Unmarked members read as `PRESENT`; nothing is written for them.
#[derive(Debug, Clone, FromRow)]
pub struct AttendanceSheetRow {
    pub member_id: MemberId,
    pub member_name: String,
    pub member_code: String,
    pub room_id: RoomId,
    pub room_number: String,
    pub bed_id: BedId,
    pub bed_number: String,
    pub attendance_id: Option<AttendanceId>,
    pub status: AttendanceStatus,
    pub remarks: Option<String>,
    pub marked: bool,
}
