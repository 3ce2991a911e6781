//! API request/response models for mess orders.

use crate::db::models::food_items::MealCategory;
use crate::db::models::food_orders::{FoodOrderDBResponse, FoodOrderLine};
use crate::types::{BillId, FoodItemId, FoodOrderId, MemberId, UserId};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ListFoodOrdersQuery {
    /// Only orders for this day
    pub date: Option<NaiveDate>,
    pub is_billed: Option<bool>,
    #[param(value_type = Option<String>, format = "uuid")]
    pub member_id: Option<MemberId>,
}

/// One requested line: which menu item and how many
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FoodOrderItemRequest {
    #[schema(value_type = String, format = "uuid")]
    pub food_item_id: FoodItemId,
    #[schema(minimum = 1)]
    pub quantity: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FoodOrderCreate {
    #[schema(value_type = String, format = "uuid")]
    pub member_id: MemberId,
    pub items: Vec<FoodOrderItemRequest>,
    /// Defaults to today
    pub order_date: Option<NaiveDate>,
    pub remarks: Option<String>,
}

/// `items` adjusts quantities of lines already on the order; names and prices stay as ordered.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct FoodOrderUpdate {
    pub remarks: Option<String>,
    pub items: Option<Vec<FoodOrderItemRequest>>,
}

/// A line as stored on the order, with the menu values copied at order time
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FoodOrderLineResponse {
    #[schema(value_type = String, format = "uuid")]
    pub food_item_id: FoodItemId,
    pub name: String,
    pub category: MealCategory,
    #[schema(value_type = f64)]
    pub price: Decimal,
    pub quantity: i32,
}

impl From<FoodOrderLine> for FoodOrderLineResponse {
    fn from(line: FoodOrderLine) -> Self {
        Self {
            food_item_id: line.food_item_id,
            name: line.name,
            category: line.category,
            price: line.price,
            quantity: line.quantity,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FoodOrderResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: FoodOrderId,
    #[schema(value_type = String, format = "uuid")]
    pub member_id: MemberId,
    pub member_name: String,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub ordered_by: Option<UserId>,
    pub order_date: NaiveDate,
    pub items: Vec<FoodOrderLineResponse>,
    #[schema(value_type = f64)]
    pub total_amount: Decimal,
    pub is_billed: bool,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub bill_id: Option<BillId>,
    pub remarks: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<FoodOrderDBResponse> for FoodOrderResponse {
    fn from(db: FoodOrderDBResponse) -> Self {
        Self {
            id: db.id,
            member_id: db.member_id,
            member_name: db.member_name,
            ordered_by: db.ordered_by,
            order_date: db.order_date,
            items: db.items.into_iter().map(FoodOrderLineResponse::from).collect(),
            total_amount: db.total_amount,
            is_billed: db.is_billed,
            bill_id: db.bill_id,
            remarks: db.remarks,
            is_active: db.lifecycle.is_active(),
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}
