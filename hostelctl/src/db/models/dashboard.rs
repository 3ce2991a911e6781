//! Database models for dashboard snapshots.
//!
//! A snapshot is computed on demand and stored as one JSONB document per day; it is overwritten on
//! every refresh and never maintained incrementally.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use sqlx::types::Json;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct RoleCount {
    pub role: String,
    pub count: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub total: i64,
    pub active: i64,
    pub by_role: Vec<RoleCount>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct MemberStats {
    pub total: i64,
    pub active: i64,
    pub on_leave: i64,
    pub left: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct RoomStats {
    pub total_rooms: i64,
    pub available_rooms: i64,
    pub full_rooms: i64,
    pub maintenance_rooms: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct BedStats {
    pub total_beds: i64,
    pub occupied_beds: i64,
    pub available_beds: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentStats {
    pub active: i64,
    pub closed: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct MessStats {
    pub today_orders: i64,
    pub today_revenue: Decimal,
    pub month_revenue: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct BillingStats {
    pub total_bills: i64,
    pub unpaid_bills: i64,
    pub partial_bills: i64,
    pub paid_bills: i64,
    /// Sum of paid amounts
    pub total_revenue: Decimal,
    pub total_due: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct VisitorStats {
    pub today_visitors: i64,
    pub currently_inside: i64,
}

/// The nested counters stored in `dashboard_stats.stats`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub users: UserStats,
    pub members: MemberStats,
    pub rooms: RoomStats,
    pub beds: BedStats,
    pub bed_assignments: AssignmentStats,
    pub mess: MessStats,
    pub billing: BillingStats,
    pub visitors: VisitorStats,
}

#[derive(Debug, Clone, FromRow)]
pub struct DashboardDBResponse {
    pub id: Uuid,
    pub date: NaiveDate,
    pub stats: Json<DashboardStats>,
    pub last_updated_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}
