//! API request/response models for the mess menu.

use crate::db::models::food_items::{FoodItemDBResponse, MealCategory};
use crate::types::{FoodItemId, UserId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ListFoodItemsQuery {
    pub category: Option<MealCategory>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FoodItemCreate {
    #[schema(example = "Chicken Biryani")]
    pub name: String,
    pub category: MealCategory,
    #[schema(value_type = f64, example = 350.0)]
    pub price: Decimal,
}

/// Price changes never touch existing orders, which keep their own copy.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FoodItemUpdate {
    pub name: Option<String>,
    pub category: Option<MealCategory>,
    #[schema(value_type = Option<f64>)]
    pub price: Option<Decimal>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FoodItemResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: FoodItemId,
    pub name: String,
    pub category: MealCategory,
    #[schema(value_type = f64)]
    pub price: Decimal,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub created_by: Option<UserId>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<FoodItemDBResponse> for FoodItemResponse {
    fn from(db: FoodItemDBResponse) -> Self {
        Self {
            id: db.id,
            name: db.name,
            category: db.category,
            price: db.price,
            created_by: db.created_by,
            is_active: db.lifecycle.is_active(),
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}
