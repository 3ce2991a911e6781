//! Database models for food orders.
//!
//! Order lines are snapshots: the item name, category and price are copied at order time so
//! later catalog edits never change a historical order or a bill built from it.

use crate::db::models::food_items::MealCategory;
use crate::types::{BillId, FoodItemId, FoodOrderId, Lifecycle, MemberId, UserId};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::FromRow;

/// One snapshot line of an order
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct FoodOrderLine {
    pub food_item_id: FoodItemId,
    pub name: String,
    pub category: MealCategory,
    pub price: Decimal,
    pub quantity: i32,
}

/// Sum of price x quantity over all lines.
pub fn order_total(lines: &[FoodOrderLine]) -> Decimal {
    lines
        .iter()
        .map(|line| line.price * Decimal::from(line.quantity))
        .sum()
}

/// Database request for creating an order
#[derive(Debug, Clone)]
pub struct FoodOrderCreateDBRequest {
    pub member_id: MemberId,
    pub ordered_by: Option<UserId>,
    /// Defaults to today when absent
    pub order_date: Option<NaiveDate>,
    pub lines: Vec<FoodOrderLine>,
    pub remarks: Option<String>,
}

/// Database request for updating an order
#[derive(Debug, Clone, Default)]
pub struct FoodOrderUpdateDBRequest {
    pub remarks: Option<String>,
    /// Replaces every line (and so the total) when present
    pub lines: Option<Vec<FoodOrderLine>>,
}

/// Order header row
#[derive(Debug, Clone, FromRow)]
pub struct FoodOrderRow {
    pub id: FoodOrderId,
    pub member_id: MemberId,
    pub member_name: String,
    pub ordered_by: Option<UserId>,
    pub order_date: NaiveDate,
    pub total_amount: Decimal,
    pub is_billed: bool,
    pub bill_id: Option<BillId>,
    pub remarks: Option<String>,
    pub lifecycle: Lifecycle,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Database response for an order with its lines in original order
#[derive(Debug, Clone)]
pub struct FoodOrderDBResponse {
    pub id: FoodOrderId,
    pub member_id: MemberId,
    pub member_name: String,
    pub ordered_by: Option<UserId>,
    pub order_date: NaiveDate,
    pub items: Vec<FoodOrderLine>,
    pub total_amount: Decimal,
    pub is_billed: bool,
    pub bill_id: Option<BillId>,
    pub remarks: Option<String>,
    pub lifecycle: Lifecycle,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<(FoodOrderRow, Vec<FoodOrderLine>)> for FoodOrderDBResponse {
    fn from((row, items): (FoodOrderRow, Vec<FoodOrderLine>)) -> Self {
        Self {
            id: row.id,
            member_id: row.member_id,
            member_name: row.member_name,
            ordered_by: row.ordered_by,
            order_date: row.order_date,
            items,
            total_amount: row.total_amount,
            is_billed: row.is_billed,
            bill_id: row.bill_id,
            remarks: row.remarks,
            lifecycle: row.lifecycle,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}
