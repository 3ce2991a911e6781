//! API request/response models for the visitor log.

use crate::db::models::visitors::{VisitorDBResponse, VisitorStatus};
use crate::types::{MemberId, UserId, VisitorId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ListVisitorsQuery {
    #[param(value_type = Option<String>, format = "uuid")]
    pub member_id: Option<MemberId>,
    pub status: Option<VisitorStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VisitorCreate {
    #[schema(example = "Tariq Mehmood")]
    pub visitor_name: String,
    pub visitor_phone: Option<String>,
    #[schema(example = "Family visit")]
    pub purpose: String,
    /// The resident being visited
    #[schema(value_type = String, format = "uuid")]
    pub member_id: MemberId,
    pub remarks: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct VisitorCheckout {
    pub remarks: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VisitorResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: VisitorId,
    pub visitor_name: String,
    pub visitor_phone: Option<String>,
    pub purpose: String,
    #[schema(value_type = String, format = "uuid")]
    pub member_id: MemberId,
    pub member_name: String,
    pub in_time: DateTime<Utc>,
    pub out_time: Option<DateTime<Utc>>,
    pub status: VisitorStatus,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub logged_by: Option<UserId>,
    pub remarks: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<VisitorDBResponse> for VisitorResponse {
    fn from(db: VisitorDBResponse) -> Self {
        Self {
            id: db.id,
            visitor_name: db.visitor_name,
            visitor_phone: db.visitor_phone,
            purpose: db.purpose,
            member_id: db.member_id,
            member_name: db.member_name,
            in_time: db.in_time,
            out_time: db.out_time,
            status: db.status,
            logged_by: db.logged_by,
            remarks: db.remarks,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}
