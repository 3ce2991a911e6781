//! Database repository for the mess catalog.

use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::food_items::{FoodItemCreateDBRequest, FoodItemDBResponse, FoodItemUpdateDBRequest, MealCategory},
};
use crate::types::{FoodItemId, Lifecycle, abbrev_uuid};
use sqlx::{PgConnection, QueryBuilder};
use std::collections::HashMap;
use tracing::instrument;

const SELECT_FOOD_ITEMS: &str =
    "SELECT id, name, category, price, created_by, lifecycle, created_at, updated_at FROM food_items";

/// Filter for listing food items
#[derive(Debug, Clone, Default)]
pub struct FoodItemFilter {
    pub category: Option<MealCategory>,
    pub lifecycle: Option<Lifecycle>,
}

pub struct FoodItems<'c> {
    db: &'c mut PgConnection,
}

impl<'c> FoodItems<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }
}

#[async_trait::async_trait]
impl<'c> Repository for FoodItems<'c> {
    type CreateRequest = FoodItemCreateDBRequest;
    type UpdateRequest = FoodItemUpdateDBRequest;
    type Response = FoodItemDBResponse;
    type Id = FoodItemId;
    type Filter = FoodItemFilter;

    #[instrument(skip(self, request), fields(name = %request.name), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let item = sqlx::query_as::<_, FoodItemDBResponse>(
            r#"
            INSERT INTO food_items (name, category, price, created_by)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, category, price, created_by, lifecycle, created_at, updated_at
            "#,
        )
        .bind(&request.name)
        .bind(request.category)
        .bind(request.price)
        .bind(request.created_by)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(item)
    }

    #[instrument(skip(self), fields(food_item_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let item = sqlx::query_as::<_, FoodItemDBResponse>(&format!("{SELECT_FOOD_ITEMS} WHERE id = $1"))
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(item)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<Self::Id>) -> Result<HashMap<Self::Id, Self::Response>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let items = sqlx::query_as::<_, FoodItemDBResponse>(&format!("{SELECT_FOOD_ITEMS} WHERE id = ANY($1)"))
            .bind(&ids)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(items.into_iter().map(|i| (i.id, i)).collect())
    }

    #[instrument(skip(self, filter), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let mut query = QueryBuilder::new(SELECT_FOOD_ITEMS);
        query.push(" WHERE TRUE");
        if let Some(category) = filter.category {
            query.push(" AND category = ").push_bind(category);
        }
        if let Some(lifecycle) = filter.lifecycle {
            query.push(" AND lifecycle = ").push_bind(lifecycle);
        }
        query.push(" ORDER BY category, name");

        let items = query.build_query_as::<FoodItemDBResponse>().fetch_all(&mut *self.db).await?;
        Ok(items)
    }

    /// Soft delete
    #[instrument(skip(self), fields(food_item_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("UPDATE food_items SET lifecycle = 'INACTIVE', updated_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(food_item_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let item = sqlx::query_as::<_, FoodItemDBResponse>(
            r#"
            UPDATE food_items SET
                name = COALESCE($2, name),
                category = COALESCE($3, category),
                price = COALESCE($4, price),
                lifecycle = COALESCE($5, lifecycle),
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, name, category, price, created_by, lifecycle, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(&request.name)
        .bind(request.category)
        .bind(request.price)
        .bind(request.lifecycle)
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        Ok(item)
    }
}
