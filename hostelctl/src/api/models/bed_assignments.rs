//! API request/response models for bed assignments.

use crate::db::models::bed_assignments::{AssignmentStatus, BedAssignmentDBResponse};
use crate::types::{BedAssignmentId, BedId, MemberId, RoomId, UserId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Query parameters for listing assignments
#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ListBedAssignmentsQuery {
    pub status: Option<AssignmentStatus>,
    #[param(value_type = Option<String>, format = "uuid")]
    pub member_id: Option<MemberId>,
    #[param(value_type = Option<String>, format = "uuid")]
    pub bed_id: Option<BedId>,
}

/// Request body for placing a member in a bed. The room is taken from the bed.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BedAssignmentCreate {
    #[schema(value_type = String, format = "uuid")]
    pub member_id: MemberId,
    #[schema(value_type = String, format = "uuid")]
    pub bed_id: BedId,
    /// Whether rent for this stay is added to generated bills (default true)
    pub billable: Option<bool>,
    pub remarks: Option<String>,
}

/// Only bookkeeping fields; closing goes through `PUT /bed-assignments/{id}/close`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct BedAssignmentUpdate {
    pub remarks: Option<String>,
    pub billable: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BedAssignmentResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: BedAssignmentId,
    #[schema(value_type = String, format = "uuid")]
    pub member_id: MemberId,
    pub member_name: String,
    pub member_code: String,
    #[schema(value_type = String, format = "uuid")]
    pub bed_id: BedId,
    pub bed_number: String,
    #[schema(value_type = String, format = "uuid")]
    pub room_id: RoomId,
    pub room_number: String,
    /// Room rent per bed when the assignment was made
    #[schema(value_type = f64)]
    pub rent_at_assignment: Decimal,
    pub status: AssignmentStatus,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub billable: bool,
    pub remarks: Option<String>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub assigned_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<BedAssignmentDBResponse> for BedAssignmentResponse {
    fn from(db: BedAssignmentDBResponse) -> Self {
        Self {
            id: db.id,
            member_id: db.member_id,
            member_name: db.member_name,
            member_code: db.member_code,
            bed_id: db.bed_id,
            bed_number: db.bed_number,
            room_id: db.room_id,
            room_number: db.room_number,
            rent_at_assignment: db.rent_at_assignment,
            status: db.status,
            start_date: db.start_date,
            end_date: db.end_date,
            billable: db.billable,
            remarks: db.remarks,
            assigned_by: db.assigned_by,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}
