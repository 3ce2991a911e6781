//! API request/response models for daily attendance.

use crate::db::models::attendance::{AttendanceDBResponse, AttendanceSheetRow, AttendanceStatus};
use crate::types::{AttendanceId, BedId, MemberId, RoomId, UserId};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Attendance is kept per calendar day: accept a plain date or a full timestamp and keep only the
/// (UTC) day.
fn day<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    let s = s.trim();
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(date);
    }
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(s) {
        return Ok(timestamp.with_timezone(&Utc).date_naive());
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|timestamp| timestamp.date())
        .map_err(|_| serde::de::Error::custom(format!("invalid date: {s}")))
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SheetQuery {
    #[serde(deserialize_with = "day")]
    #[param(value_type = String, format = "date")]
    pub date: NaiveDate,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct RoomAttendanceQuery {
    #[param(value_type = String, format = "uuid")]
    pub room_id: RoomId,
    #[serde(deserialize_with = "day")]
    #[param(value_type = String, format = "date")]
    pub date: NaiveDate,
}

/// One line of a submitted sheet. Room and bed default to the member's current placement.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecordRequest {
    #[schema(value_type = String, format = "uuid")]
    pub member_id: MemberId,
    /// Defaults to `PRESENT`
    pub status: Option<AttendanceStatus>,
    pub remarks: Option<String>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub room_id: Option<RoomId>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub bed_id: Option<BedId>,
}

/// A full sheet for one date. Re-submitting overwrites earlier marks for the same members.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MarkBulkAttendance {
    /// A date or timestamp; only the day is kept
    #[serde(deserialize_with = "day")]
    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,
    pub records: Vec<AttendanceRecordRequest>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: AttendanceId,
    #[schema(value_type = String, format = "uuid")]
    pub member_id: MemberId,
    pub member_name: String,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub room_id: Option<RoomId>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub bed_id: Option<BedId>,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    pub remarks: Option<String>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub marked_by: Option<UserId>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<AttendanceDBResponse> for AttendanceResponse {
    fn from(db: AttendanceDBResponse) -> Self {
        Self {
            id: db.id,
            member_id: db.member_id,
            member_name: db.member_name,
            room_id: db.room_id,
            bed_id: db.bed_id,
            date: db.date,
            status: db.status,
            remarks: db.remarks,
            marked_by: db.marked_by,
            is_active: db.lifecycle.is_active(),
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

/// A resident on the day's sheet. Unmarked residents show as `PRESENT` with `marked: false`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceSheetEntry {
    #[schema(value_type = String, format = "uuid")]
    pub member_id: MemberId,
    pub member_name: String,
    pub member_code: String,
    #[schema(value_type = String, format = "uuid")]
    pub room_id: RoomId,
    pub room_number: String,
    #[schema(value_type = String, format = "uuid")]
    pub bed_id: BedId,
    pub bed_number: String,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub attendance_id: Option<AttendanceId>,
    pub status: AttendanceStatus,
    pub remarks: Option<String>,
    pub marked: bool,
}

impl From<AttendanceSheetRow> for AttendanceSheetEntry {
    fn from(row: AttendanceSheetRow) -> Self {
        Self {
            member_id: row.member_id,
            member_name: row.member_name,
            member_code: row.member_code,
            room_id: row.room_id,
            room_number: row.room_number,
            bed_id: row.bed_id,
            bed_number: row.bed_number,
            attendance_id: row.attendance_id,
            status: row.status,
            remarks: row.remarks,
            marked: row.marked,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sheet_date(date: &str) -> Result<NaiveDate, serde_json::Error> {
        serde_json::from_value::<MarkBulkAttendance>(json!({"date": date, "records": []})).map(|sheet| sheet.date)
    }

    #[test]
    fn test_sheet_date_keeps_only_the_day() {
        let expected = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();
        assert_eq!(sheet_date("2026-10-16").unwrap(), expected);
        assert_eq!(sheet_date("2026-10-16T08:00:00Z").unwrap(), expected);
        assert_eq!(sheet_date("2026-10-16T23:30:00.250").unwrap(), expected);
        // Converted to UTC before truncating
        assert_eq!(sheet_date("2026-10-17T02:00:00+05:00").unwrap(), expected);
    }

    #[test]
    fn test_sheet_date_rejects_garbage() {
        assert!(sheet_date("yesterday").is_err());
        assert!(sheet_date("2026-13-01").is_err());
    }
}
