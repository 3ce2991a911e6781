//! Database models for rooms.

use crate::types::{Lifecycle, RoomId, UserId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum RoomType {
    Single,
    Double,
    Triple,
}

/// Occupancy state of a room.
///
/// `Available` and `Full` are derived from the occupied bed count; `Maintenance` is set by an
/// operator and sticks until cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum RoomStatus {
    Available,
    Full,
    Maintenance,
}

impl RoomStatus {
    /// Status implied by occupancy, keeping maintenance in place.
    pub fn derive(current: RoomStatus, occupied: i64, total_beds: i32) -> RoomStatus {
        match current {
            RoomStatus::Maintenance => RoomStatus::Maintenance,
            _ if occupied >= i64::from(total_beds) => RoomStatus::Full,
            _ => RoomStatus::Available,
        }
    }
}

/// Database request for creating a room
#[derive(Debug, Clone)]
pub struct RoomCreateDBRequest {
    pub room_number: String,
    pub floor: i32,
    pub total_beds: i32,
    pub room_type: RoomType,
    pub rent_per_bed: Decimal,
    pub has_ac: bool,
    pub has_washroom: bool,
    pub created_by: Option<UserId>,
}

/// Database request for updating a room
#[derive(Debug, Clone, Default)]
pub struct RoomUpdateDBRequest {
    pub room_number: Option<String>,
    pub floor: Option<i32>,
    pub total_beds: Option<i32>,
    pub room_type: Option<RoomType>,
    pub rent_per_bed: Option<Decimal>,
    pub has_ac: Option<bool>,
    pub has_washroom: Option<bool>,
    pub status: Option<RoomStatus>,
    pub lifecycle: Option<Lifecycle>,
}

/// Database response for a room, with its live occupied-bed count
#[derive(Debug, Clone, FromRow)]
pub struct RoomDBResponse {
    pub id: RoomId,
    pub room_number: String,
    pub floor: i32,
    pub total_beds: i32,
    pub room_type: RoomType,
    pub rent_per_bed: Decimal,
    pub status: RoomStatus,
    pub has_ac: bool,
    pub has_washroom: bool,
    pub occupied_beds: i64,
    pub created_by: Option<UserId>,
    pub lifecycle: Lifecycle,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_status_from_occupancy() {
        assert_eq!(RoomStatus::derive(RoomStatus::Available, 0, 2), RoomStatus::Available);
        assert_eq!(RoomStatus::derive(RoomStatus::Available, 1, 2), RoomStatus::Available);
        assert_eq!(RoomStatus::derive(RoomStatus::Available, 2, 2), RoomStatus::Full);
        // Closing one of two in a full room frees it
        assert_eq!(RoomStatus::derive(RoomStatus::Full, 1, 2), RoomStatus::Available);
        // Still full if every bed remains occupied after a capacity change
        assert_eq!(RoomStatus::derive(RoomStatus::Full, 3, 2), RoomStatus::Full);
    }

    #[test]
    fn test_maintenance_sticks() {
        assert_eq!(RoomStatus::derive(RoomStatus::Maintenance, 0, 2), RoomStatus::Maintenance);
        assert_eq!(RoomStatus::derive(RoomStatus::Maintenance, 2, 2), RoomStatus::Maintenance);
    }
}
