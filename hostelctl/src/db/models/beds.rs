//! Database models for beds.

use crate::types::{BedId, Lifecycle, RoomId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum BedStatus {
    Available,
    Occupied,
    Maintenance,
}

/// Database request for creating a bed
#[derive(Debug, Clone)]
pub struct BedCreateDBRequest {
    pub bed_number: String,
    pub room_id: RoomId,
    pub created_by: Option<UserId>,
}

/// Database request for updating a bed
#[derive(Debug, Clone, Default)]
pub struct BedUpdateDBRequest {
    pub bed_number: Option<String>,
    pub status: Option<BedStatus>,
    pub lifecycle: Option<Lifecycle>,
}

/// Database response for a bed, joined with its room number
#[derive(Debug, Clone, FromRow)]
pub struct BedDBResponse {
    pub id: BedId,
    pub bed_number: String,
    pub room_id: RoomId,
    pub room_number: String,
    pub status: BedStatus,
    pub created_by: Option<UserId>,
    pub lifecycle: Lifecycle,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
