//! Database models for the visitor log.

use crate::types::{MemberId, UserId, VisitorId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum VisitorStatus {
    In,
    Out,
}

/// Database request for checking a visitor in
#[derive(Debug, Clone)]
pub struct VisitorCreateDBRequest {
    pub visitor_name: String,
    pub visitor_phone: Option<String>,
    pub purpose: String,
    pub member_id: MemberId,
    pub remarks: Option<String>,
    pub logged_by: Option<UserId>,
}

/// Database request for checking a visitor out
#[derive(Debug, Clone, Default)]
pub struct VisitorUpdateDBRequest {
    pub remarks: Option<String>,
    pub check_out: bool,
}

#[derive(Debug, Clone, FromRow)]
pub struct VisitorDBResponse {
    pub id: VisitorId,
    pub visitor_name: String,
    pub visitor_phone: Option<String>,
    pub purpose: String,
    pub member_id: MemberId,
    pub member_name: String,
    pub in_time: DateTime<Utc>,
    pub out_time: Option<DateTime<Utc>>,
    pub status: VisitorStatus,
    pub logged_by: Option<UserId>,
    pub remarks: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
