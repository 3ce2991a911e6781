//! API response model for dashboard snapshots.

use crate::db::models::dashboard::{DashboardDBResponse, DashboardStats};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DashboardResponse {
    /// Day the snapshot was taken for
    pub date: NaiveDate,
    pub stats: DashboardStats,
    pub last_updated_at: DateTime<Utc>,
}

impl From<DashboardDBResponse> for DashboardResponse {
    fn from(db: DashboardDBResponse) -> Self {
        Self {
            date: db.date,
            stats: db.stats.0,
            last_updated_at: db.last_updated_at,
        }
    }
}
