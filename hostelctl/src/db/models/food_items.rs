//! Database models for the mess catalog.

use crate::types::{FoodItemId, Lifecycle, UserId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum MealCategory {
    Breakfast,
    Lunch,
    Dinner,
    Snack,
}

/// Database request for creating a food item
#[derive(Debug, Clone)]
pub struct FoodItemCreateDBRequest {
    pub name: String,
    pub category: MealCategory,
    pub price: Decimal,
    pub created_by: Option<UserId>,
}

/// Database request for updating a food item
#[derive(Debug, Clone, Default)]
pub struct FoodItemUpdateDBRequest {
    pub name: Option<String>,
    pub category: Option<MealCategory>,
    pub price: Option<Decimal>,
    pub lifecycle: Option<Lifecycle>,
}

/// Database response for a food item
#[derive(Debug, Clone, FromRow)]
pub struct FoodItemDBResponse {
    pub id: FoodItemId,
    pub name: String,
    pub category: MealCategory,
    pub price: Decimal,
    pub created_by: Option<UserId>,
    pub lifecycle: Lifecycle,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
