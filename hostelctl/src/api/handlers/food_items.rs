use crate::{
    AppState,
    api::JsonBody,
    api::models::{
        food_items::{FoodItemCreate, FoodItemResponse, FoodItemUpdate, ListFoodItemsQuery},
        response::{ApiResponse, MessageResponse},
    },
    auth::permissions::{RequiresPermission, require},
    db::handlers::{FoodItems, Repository, food_items::FoodItemFilter},
    db::models::food_items::{FoodItemCreateDBRequest, FoodItemUpdateDBRequest},
    errors::{Error, Result},
    types::{FoodItemId, Lifecycle},
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use rust_decimal::Decimal;

#[utoipa::path(
    post,
    path = "/food-items",
    request_body = FoodItemCreate,
    tag = "food-items",
    summary = "Add menu item",
    responses(
        (status = 201, description = "Food item created", body = ApiResponse<FoodItemResponse>),
        (status = 400, description = "Invalid fields or duplicate name in category"),
        (status = 403, description = "Missing FOOD_ITEM_CREATE"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_food_item(
    State(state): State<AppState>,
    current_user: RequiresPermission<require::FoodItemCreate>,
    JsonBody(body): JsonBody<FoodItemCreate>,
) -> Result<(StatusCode, Json<ApiResponse<FoodItemResponse>>)> {
    let name = body.name.trim();
    if name.is_empty() {
        return Err(Error::bad_request("Name, category and price are required"));
    }
    if body.price < Decimal::ZERO {
        return Err(Error::bad_request("Price cannot be negative"));
    }

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let item = FoodItems::new(&mut conn)
        .create(&FoodItemCreateDBRequest {
            name: name.to_string(),
            category: body.category,
            price: body.price,
            created_by: Some(current_user.id),
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message("Food item created successfully", FoodItemResponse::from(item))),
    ))
}

#[utoipa::path(
    get,
    path = "/food-items",
    tag = "food-items",
    summary = "List menu items",
    params(ListFoodItemsQuery),
    responses(
        (status = 200, description = "Food items", body = ApiResponse<Vec<FoodItemResponse>>),
        (status = 403, description = "Missing FOOD_ITEM_VIEW"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_food_items(
    State(state): State<AppState>,
    Query(query): Query<ListFoodItemsQuery>,
    _: RequiresPermission<require::FoodItemView>,
) -> Result<Json<ApiResponse<Vec<FoodItemResponse>>>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let items = FoodItems::new(&mut conn)
        .list(&FoodItemFilter {
            category: query.category,
            lifecycle: query.is_active.map(Lifecycle::from),
        })
        .await?;

    Ok(Json(ApiResponse::list(items.into_iter().map(FoodItemResponse::from).collect())))
}

#[utoipa::path(
    get,
    path = "/food-items/{id}",
    tag = "food-items",
    summary = "Get menu item",
    params(("id" = uuid::Uuid, Path, description = "Food item ID")),
    responses(
        (status = 200, description = "Food item", body = ApiResponse<FoodItemResponse>),
        (status = 404, description = "Food item not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_food_item(
    State(state): State<AppState>,
    Path(id): Path<FoodItemId>,
    _: RequiresPermission<require::FoodItemView>,
) -> Result<Json<ApiResponse<FoodItemResponse>>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let item = FoodItems::new(&mut conn)
        .get_by_id(id)
        .await?
        .ok_or_else(|| Error::not_found("Food item", id))?;

    Ok(Json(ApiResponse::data(FoodItemResponse::from(item))))
}

#[utoipa::path(
    put,
    path = "/food-items/{id}",
    request_body = FoodItemUpdate,
    tag = "food-items",
    summary = "Update menu item",
    params(("id" = uuid::Uuid, Path, description = "Food item ID")),
    responses(
        (status = 200, description = "Updated food item", body = ApiResponse<FoodItemResponse>),
        (status = 400, description = "Invalid price or duplicate name"),
        (status = 404, description = "Food item not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_food_item(
    State(state): State<AppState>,
    Path(id): Path<FoodItemId>,
    _: RequiresPermission<require::FoodItemUpdate>,
    JsonBody(body): JsonBody<FoodItemUpdate>,
) -> Result<Json<ApiResponse<FoodItemResponse>>> {
    if body.price.is_some_and(|price| price < Decimal::ZERO) {
        return Err(Error::bad_request("Price cannot be negative"));
    }

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = FoodItems::new(&mut conn);
    if repo.get_by_id(id).await?.is_none() {
        return Err(Error::not_found("Food item", id));
    }

    let item = repo
        .update(
            id,
            &FoodItemUpdateDBRequest {
                name: body.name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
                category: body.category,
                price: body.price,
                lifecycle: body.is_active.map(Lifecycle::from),
            },
        )
        .await?;

    Ok(Json(ApiResponse::with_message("Food item updated successfully", FoodItemResponse::from(item))))
}

#[utoipa::path(
    delete,
    path = "/food-items/{id}",
    tag = "food-items",
    summary = "Deactivate menu item",
    params(("id" = uuid::Uuid, Path, description = "Food item ID")),
    responses(
        (status = 200, description = "Food item deactivated", body = MessageResponse),
        (status = 404, description = "Food item not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_food_item(
    State(state): State<AppState>,
    Path(id): Path<FoodItemId>,
    _: RequiresPermission<require::FoodItemDelete>,
) -> Result<Json<MessageResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    if !FoodItems::new(&mut conn).delete(id).await? {
        return Err(Error::not_found("Food item", id));
    }

    Ok(Json(MessageResponse::new("Food item deleted successfully")))
}
