//! Database models for bills.

use crate::types::{BillId, MemberId, UserId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// Title of the line built from the member's active billable assignment
pub const ROOM_RENT_TITLE: &str = "Room Rent";
/// Title of the single line summing every unbilled food order
pub const MESS_CHARGES_TITLE: &str = "Mess Charges";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum BillStatus {
    Unpaid,
    Partial,
    Paid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema, FromRow)]
pub struct BillItem {
    pub title: String,
    #[schema(value_type = f64)]
    pub amount: Decimal,
}

/// Totals derived from a bill's items and what has been paid so far
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BillTotals {
    pub total: Decimal,
    pub due: Decimal,
    pub status: BillStatus,
}

/// Re-derive total, due and status.
///
/// `due` is clamped at zero; an over-payment stays visible in the paid amount.
pub fn derive_totals(items: &[BillItem], paid: Decimal) -> BillTotals {
    let total: Decimal = items.iter().map(|item| item.amount).sum();
    let due = (total - paid).max(Decimal::ZERO);
    let status = if due <= Decimal::ZERO {
        BillStatus::Paid
    } else if paid > Decimal::ZERO {
        BillStatus::Partial
    } else {
        BillStatus::Unpaid
    };
    BillTotals { total, due, status }
}

/// Format the sequence value as a bill number, e.g. `BILL-000042`.
pub fn format_bill_number(sequence: i64) -> String {
    format!("BILL-{sequence:06}")
}

/// `YYYY-MM` with a month between 01 and 12.
pub fn is_valid_bill_month(month: &str) -> bool {
    let bytes = month.as_bytes();
    if bytes.len() != 7 || bytes[4] != b'-' {
        return false;
    }
    if !bytes[..4].iter().chain(&bytes[5..]).all(u8::is_ascii_digit) {
        return false;
    }
    matches!(month[5..].parse::<u8>(), Ok(1..=12))
}

/// The current UTC month as `YYYY-MM`.
pub fn current_bill_month() -> String {
    Utc::now().format("%Y-%m").to_string()
}

/// Database request for creating a bill. Number and totals are assigned by the repository.
#[derive(Debug, Clone)]
pub struct BillCreateDBRequest {
    pub member_id: MemberId,
    pub bill_month: String,
    pub items: Vec<BillItem>,
    pub remarks: Option<String>,
    pub generated_by: Option<UserId>,
}

/// Database request for updating a bill. Totals are re-derived whenever either items or the paid
/// amount change.
#[derive(Debug, Clone, Default)]
pub struct BillUpdateDBRequest {
    pub items: Option<Vec<BillItem>>,
    pub remarks: Option<String>,
    pub paid_amount: Option<Decimal>,
}

/// Bill header row
#[derive(Debug, Clone, FromRow)]
pub struct BillRow {
    pub id: BillId,
    pub member_id: MemberId,
    pub member_name: String,
    pub bill_number: String,
    pub bill_month: String,
    pub total_amount: Decimal,
    pub paid_amount: Decimal,
    pub due_amount: Decimal,
    pub status: BillStatus,
    pub generated_by: Option<UserId>,
    pub remarks: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Database response for a bill with its items in order
#[derive(Debug, Clone)]
pub struct BillDBResponse {
    pub id: BillId,
    pub member_id: MemberId,
    pub member_name: String,
    pub bill_number: String,
    pub bill_month: String,
    pub items: Vec<BillItem>,
    pub total_amount: Decimal,
    pub paid_amount: Decimal,
    pub due_amount: Decimal,
    pub status: BillStatus,
    pub generated_by: Option<UserId>,
    pub remarks: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<(BillRow, Vec<BillItem>)> for BillDBResponse {
    fn from((row, items): (BillRow, Vec<BillItem>)) -> Self {
        Self {
            id: row.id,
            member_id: row.member_id,
            member_name: row.member_name,
            bill_number: row.bill_number,
            bill_month: row.bill_month,
            items,
            total_amount: row.total_amount,
            paid_amount: row.paid_amount,
            due_amount: row.due_amount,
            status: row.status,
            generated_by: row.generated_by,
            remarks: row.remarks,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}
