//! API request/response models for beds.

use crate::db::models::beds::{BedDBResponse, BedStatus};
use crate::types::{BedId, RoomId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Query parameters for listing beds
#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ListBedsQuery {
    #[param(value_type = Option<String>, format = "uuid")]
    pub room_id: Option<RoomId>,
    pub status: Option<BedStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BedCreate {
    #[schema(example = "B1")]
    pub bed_number: String,
    #[schema(value_type = String, format = "uuid")]
    pub room_id: RoomId,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BedUpdate {
    pub bed_number: String,
}

/// `AVAILABLE` or `MAINTENANCE`. Occupancy only changes through assignments.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BedStatusUpdate {
    pub status: BedStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BedResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: BedId,
    pub bed_number: String,
    #[schema(value_type = String, format = "uuid")]
    pub room_id: RoomId,
    pub room_number: String,
    pub status: BedStatus,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub created_by: Option<UserId>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<BedDBResponse> for BedResponse {
    fn from(db: BedDBResponse) -> Self {
        Self {
            id: db.id,
            bed_number: db.bed_number,
            room_id: db.room_id,
            room_number: db.room_number,
            status: db.status,
            created_by: db.created_by,
            is_active: db.lifecycle.is_active(),
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}
