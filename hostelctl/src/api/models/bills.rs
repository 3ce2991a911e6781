//! API request/response models for monthly bills.

use crate::db::models::bills::{BillDBResponse, BillItem, BillStatus};
use crate::types::{BillId, MemberId, UserId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ListBillsQuery {
    #[param(value_type = Option<String>, format = "uuid")]
    pub member_id: Option<MemberId>,
    /// `YYYY-MM`
    pub bill_month: Option<String>,
    pub status: Option<BillStatus>,
}

/// Request body for generating a bill.
///
/// Room rent is taken from the member's active billable assignment and mess charges from their
/// unbilled orders; `extraItems` are appended as given (zero amounts are dropped).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BillCreate {
    #[schema(value_type = String, format = "uuid")]
    pub member_id: MemberId,
    /// `YYYY-MM`, defaults to the current month
    #[schema(example = "2026-10")]
    pub bill_month: Option<String>,
    #[serde(default)]
    pub extra_items: Vec<BillItem>,
    pub remarks: Option<String>,
}

/// A supplied `items` list replaces the bill's lines and re-derives its totals.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct BillUpdate {
    pub items: Option<Vec<BillItem>>,
    pub remarks: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BillPayment {
    #[schema(value_type = f64, example = 5000.0)]
    pub amount: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BillResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: BillId,
    #[schema(value_type = String, format = "uuid")]
    pub member_id: MemberId,
    pub member_name: String,
    #[schema(example = "BILL-000001")]
    pub bill_number: String,
    pub bill_month: String,
    pub items: Vec<BillItem>,
    #[schema(value_type = f64)]
    pub total_amount: Decimal,
    #[schema(value_type = f64)]
    pub paid_amount: Decimal,
    #[schema(value_type = f64)]
    pub due_amount: Decimal,
    pub status: BillStatus,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub generated_by: Option<UserId>,
    pub remarks: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<BillDBResponse> for BillResponse {
    fn from(db: BillDBResponse) -> Self {
        Self {
            id: db.id,
            member_id: db.member_id,
            member_name: db.member_name,
            bill_number: db.bill_number,
            bill_month: db.bill_month,
            items: db.items,
            total_amount: db.total_amount,
            paid_amount: db.paid_amount,
            due_amount: db.due_amount,
            status: db.status,
            generated_by: db.generated_by,
            remarks: db.remarks,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}
