//! API request/response models for rooms.

use crate::db::models::rooms::{RoomDBResponse, RoomStatus, RoomType};
use crate::types::{RoomId, UserId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Query parameters for listing rooms. Only active rooms are listed.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ListRoomsQuery {
    pub status: Option<RoomStatus>,
    pub room_type: Option<RoomType>,
    pub floor: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoomCreate {
    #[schema(example = "A-101")]
    pub room_number: String,
    pub floor: i32,
    /// Capacity, at least 1
    pub total_beds: i32,
    pub room_type: RoomType,
    #[schema(value_type = f64, example = 8000.0)]
    pub rent_per_bed: Decimal,
    #[serde(rename = "hasAC", default)]
    pub has_ac: bool,
    #[serde(default)]
    pub has_washroom: bool,
}

/// All fields optional; `totalBeds` may not drop below the occupied count.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoomUpdate {
    pub room_number: Option<String>,
    pub floor: Option<i32>,
    pub total_beds: Option<i32>,
    pub room_type: Option<RoomType>,
    #[schema(value_type = Option<f64>)]
    pub rent_per_bed: Option<Decimal>,
    #[serde(rename = "hasAC")]
    pub has_ac: Option<bool>,
    pub has_washroom: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RoomStatusUpdate {
    pub status: RoomStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoomResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: RoomId,
    pub room_number: String,
    pub floor: i32,
    pub total_beds: i32,
    /// Active beds currently occupied
    pub occupied_beds: i64,
    pub room_type: RoomType,
    #[schema(value_type = f64)]
    pub rent_per_bed: Decimal,
    pub status: RoomStatus,
    #[serde(rename = "hasAC")]
    pub has_ac: bool,
    pub has_washroom: bool,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub created_by: Option<UserId>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<RoomDBResponse> for RoomResponse {
    fn from(db: RoomDBResponse) -> Self {
        Self {
            id: db.id,
            room_number: db.room_number,
            floor: db.floor,
            total_beds: db.total_beds,
            occupied_beds: db.occupied_beds,
            room_type: db.room_type,
            rent_per_bed: db.rent_per_bed,
            status: db.status,
            has_ac: db.has_ac,
            has_washroom: db.has_washroom,
            created_by: db.created_by,
            is_active: db.lifecycle.is_active(),
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}
