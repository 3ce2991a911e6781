use crate::{
    AppState,
    api::JsonBody,
    api::models::{
        food_orders::{FoodOrderCreate, FoodOrderItemRequest, FoodOrderResponse, FoodOrderUpdate, ListFoodOrdersQuery},
        response::{ApiResponse, MessageResponse},
    },
    auth::permissions::{RequiresPermission, require},
    db::handlers::{FoodItems, FoodOrders, Members, Repository, food_orders::FoodOrderFilter},
    db::models::{
        food_orders::{FoodOrderCreateDBRequest, FoodOrderDBResponse, FoodOrderLine, FoodOrderUpdateDBRequest},
        members::MemberStatus,
    },
    errors::{Error, Result},
    types::{FoodOrderId, Lifecycle, MemberId},
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use sqlx::PgConnection;
use std::collections::HashSet;

/// Every line needs a positive quantity, and an item may appear on one line only.
fn check_items(items: &[FoodOrderItemRequest]) -> Result<()> {
    if items.iter().any(|item| item.quantity < 1) {
        return Err(Error::bad_request("Quantity must be at least 1"));
    }
    let distinct: HashSet<_> = items.iter().map(|item| item.food_item_id).collect();
    if distinct.len() != items.len() {
        return Err(Error::bad_request("Each food item may appear only once per order"));
    }
    Ok(())
}

/// Lock an order that can still be changed: present, not deleted, not yet billed.
async fn lock_open_order(conn: &mut PgConnection, id: FoodOrderId, action: &str) -> Result<FoodOrderDBResponse> {
    let order = FoodOrders::new(conn)
        .lock(id)
        .await?
        .filter(|o| o.lifecycle.is_active())
        .ok_or_else(|| Error::not_found("Food order", id))?;
    if order.is_billed {
        return Err(Error::conflict(format!("Billed order cannot be {action}")));
    }
    Ok(order)
}

#[utoipa::path(
    post,
    path = "/food-orders",
    request_body = FoodOrderCreate,
    tag = "food-orders",
    summary = "Place food order",
    description = "Each line copies the item's current name, category and price.",
    responses(
        (status = 201, description = "Order created", body = ApiResponse<FoodOrderResponse>),
        (status = 400, description = "No items, bad quantity, or invalid/inactive items"),
        (status = 404, description = "Member not found or inactive"),
        (status = 403, description = "Missing CREATE_FOOD_ORDER"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_food_order(
    State(state): State<AppState>,
    current_user: RequiresPermission<require::CreateFoodOrder>,
    JsonBody(body): JsonBody<FoodOrderCreate>,
) -> Result<(StatusCode, Json<ApiResponse<FoodOrderResponse>>)> {
    if body.items.is_empty() {
        return Err(Error::bad_request("At least one food item is required"));
    }
    check_items(&body.items)?;

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

    let member = Members::new(&mut tx)
        .get_by_id(body.member_id)
        .await?
        .filter(|m| m.lifecycle.is_active())
        .ok_or_else(|| Error::not_found("Member", body.member_id))?;
    if member.status != MemberStatus::Active {
        return Err(Error::bad_request("Member is not currently resident"));
    }

    let ids = body.items.iter().map(|item| item.food_item_id).collect();
    let catalog = FoodItems::new(&mut tx).get_bulk(ids).await?;
    let invalid: Vec<String> = body
        .items
        .iter()
        .filter(|item| !catalog.get(&item.food_item_id).is_some_and(|f| f.lifecycle.is_active()))
        .map(|item| item.food_item_id.to_string())
        .collect();
    if !invalid.is_empty() {
        return Err(Error::bad_request(format!(
            "Invalid or inactive food items: {}",
            invalid.join(", ")
        )));
    }

    let lines = body
        .items
        .iter()
        .filter_map(|item| {
            catalog.get(&item.food_item_id).map(|food| FoodOrderLine {
                food_item_id: food.id,
                name: food.name.clone(),
                category: food.category,
                price: food.price,
                quantity: item.quantity,
            })
        })
        .collect();

    let order = FoodOrders::new(&mut tx)
        .create(&FoodOrderCreateDBRequest {
            member_id: member.id,
            ordered_by: Some(current_user.id),
            order_date: body.order_date,
            lines,
            remarks: body.remarks,
        })
        .await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(
            "Food order created successfully",
            FoodOrderResponse::from(order),
        )),
    ))
}

#[utoipa::path(
    get,
    path = "/food-orders",
    tag = "food-orders",
    summary = "List food orders",
    params(ListFoodOrdersQuery),
    responses(
        (status = 200, description = "Orders, newest first", body = ApiResponse<Vec<FoodOrderResponse>>),
        (status = 403, description = "Missing VIEW_FOOD_ORDER"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_food_orders(
    State(state): State<AppState>,
    Query(query): Query<ListFoodOrdersQuery>,
    _: RequiresPermission<require::ViewFoodOrder>,
) -> Result<Json<ApiResponse<Vec<FoodOrderResponse>>>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let orders = FoodOrders::new(&mut conn)
        .list(&FoodOrderFilter {
            order_date: query.date,
            is_billed: query.is_billed,
            member_id: query.member_id,
            lifecycle: Some(Lifecycle::Active),
        })
        .await?;

    Ok(Json(ApiResponse::list(orders.into_iter().map(FoodOrderResponse::from).collect())))
}

#[utoipa::path(
    get,
    path = "/food-orders/{id}",
    tag = "food-orders",
    summary = "Get food order",
    params(("id" = uuid::Uuid, Path, description = "Food order ID")),
    responses(
        (status = 200, description = "Order", body = ApiResponse<FoodOrderResponse>),
        (status = 404, description = "Food order not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_food_order(
    State(state): State<AppState>,
    Path(id): Path<FoodOrderId>,
    _: RequiresPermission<require::ViewFoodOrder>,
) -> Result<Json<ApiResponse<FoodOrderResponse>>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let order = FoodOrders::new(&mut conn)
        .get_by_id(id)
        .await?
        .filter(|o| o.lifecycle.is_active())
        .ok_or_else(|| Error::not_found("Food order", id))?;

    Ok(Json(ApiResponse::data(FoodOrderResponse::from(order))))
}

#[utoipa::path(
    get,
    path = "/food-orders/member/{memberId}",
    tag = "food-orders",
    summary = "Food orders of a member",
    params(("memberId" = uuid::Uuid, Path, description = "Member ID")),
    responses(
        (status = 200, description = "Orders, newest first", body = ApiResponse<Vec<FoodOrderResponse>>),
        (status = 404, description = "Member not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_member_food_orders(
    State(state): State<AppState>,
    Path(member_id): Path<MemberId>,
    _: RequiresPermission<require::ViewFoodOrder>,
) -> Result<Json<ApiResponse<Vec<FoodOrderResponse>>>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    if Members::new(&mut conn).get_by_id(member_id).await?.is_none() {
        return Err(Error::not_found("Member", member_id));
    }

    let orders = FoodOrders::new(&mut conn)
        .list(&FoodOrderFilter {
            member_id: Some(member_id),
            lifecycle: Some(Lifecycle::Active),
            ..Default::default()
        })
        .await?;

    Ok(Json(ApiResponse::list(orders.into_iter().map(FoodOrderResponse::from).collect())))
}

#[utoipa::path(
    put,
    path = "/food-orders/{id}",
    request_body = FoodOrderUpdate,
    tag = "food-orders",
    summary = "Update unbilled order",
    description = "Edit remarks or change quantities of lines already on the order.",
    params(("id" = uuid::Uuid, Path, description = "Food order ID")),
    responses(
        (status = 200, description = "Updated order", body = ApiResponse<FoodOrderResponse>),
        (status = 400, description = "Order billed, or line not on order"),
        (status = 404, description = "Food order not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_food_order(
    State(state): State<AppState>,
    Path(id): Path<FoodOrderId>,
    _: RequiresPermission<require::UpdateFoodOrder>,
    JsonBody(body): JsonBody<FoodOrderUpdate>,
) -> Result<Json<ApiResponse<FoodOrderResponse>>> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let order = lock_open_order(&mut tx, id, "updated").await?;

    let lines = match body.items {
        Some(changes) => {
            check_items(&changes)?;
            let mut lines = order.items;
            for change in changes {
                let line = lines
                    .iter_mut()
                    .find(|line| line.food_item_id == change.food_item_id)
                    .ok_or_else(|| Error::bad_request(format!("Food item {} is not on this order", change.food_item_id)))?;
                line.quantity = change.quantity;
            }
            Some(lines)
        }
        None => None,
    };

    let order = FoodOrders::new(&mut tx)
        .update(
            id,
            &FoodOrderUpdateDBRequest {
                remarks: body.remarks,
                lines,
            },
        )
        .await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(ApiResponse::with_message(
        "Food order updated successfully",
        FoodOrderResponse::from(order),
    )))
}

#[utoipa::path(
    put,
    path = "/food-orders/{id}/billing",
    tag = "food-orders",
    summary = "Mark order billed",
    params(("id" = uuid::Uuid, Path, description = "Food order ID")),
    responses(
        (status = 200, description = "Order marked as billed", body = ApiResponse<FoodOrderResponse>),
        (status = 404, description = "Food order not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn mark_food_order_billed(
    State(state): State<AppState>,
    Path(id): Path<FoodOrderId>,
    _: RequiresPermission<require::BillFoodOrder>,
) -> Result<Json<ApiResponse<FoodOrderResponse>>> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let mut orders = FoodOrders::new(&mut tx);

    orders
        .lock(id)
        .await?
        .filter(|o| o.lifecycle.is_active())
        .ok_or_else(|| Error::not_found("Food order", id))?;
    orders.mark_billed(&[id], None).await?;
    let order = orders.get_by_id(id).await?.ok_or_else(|| Error::not_found("Food order", id))?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(ApiResponse::with_message(
        "Food order marked as billed",
        FoodOrderResponse::from(order),
    )))
}

#[utoipa::path(
    delete,
    path = "/food-orders/{id}",
    tag = "food-orders",
    summary = "Delete unbilled order",
    params(("id" = uuid::Uuid, Path, description = "Food order ID")),
    responses(
        (status = 200, description = "Order deleted", body = MessageResponse),
        (status = 400, description = "Order already billed"),
        (status = 404, description = "Food order not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_food_order(
    State(state): State<AppState>,
    Path(id): Path<FoodOrderId>,
    _: RequiresPermission<require::DeleteFoodOrder>,
) -> Result<Json<MessageResponse>> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    lock_open_order(&mut tx, id, "deleted").await?;

    FoodOrders::new(&mut tx).delete(id).await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(MessageResponse::new("Food order deleted successfully")))
}

#[cfg(test)]
mod tests {
    use crate::{
        api::models::{food_orders::FoodOrderResponse, response::ApiResponse},
        db::handlers::{FoodItems, Repository},
        db::models::food_items::{FoodItemCreateDBRequest, FoodItemDBResponse, MealCategory},
        test_utils::*,
        types::PermissionKey,
    };
    use axum::http::StatusCode;
    use rust_decimal::Decimal;
    use serde_json::json;
    use sqlx::PgPool;

    async fn food_item(pool: &PgPool, name: &str, price: i64) -> FoodItemDBResponse {
        let mut conn = pool.acquire().await.unwrap();
        FoodItems::new(&mut conn)
            .create(&FoodItemCreateDBRequest {
                name: name.to_string(),
                category: MealCategory::Lunch,
                price: Decimal::from(price),
                created_by: None,
            })
            .await
            .unwrap()
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_order_snapshot_survives_price_edit(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let admin = create_test_admin(&pool).await;
        let member = create_test_member(&pool, "M1").await;
        let biryani = food_item(&pool, "Biryani", 250).await;
        let raita = food_item(&pool, "Raita", 50).await;
        let (name, value) = auth_header(&admin);

        let response = app
            .post("/api/food-orders")
            .add_header(name.clone(), value.clone())
            .json(&json!({
                "memberId": member.id,
                "items": [
                    {"foodItemId": biryani.id, "quantity": 1},
                    {"foodItemId": raita.id, "quantity": 1},
                ],
            }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let order = response.json::<ApiResponse<FoodOrderResponse>>().data.unwrap();
        assert_eq!(order.total_amount, Decimal::from(300));
        assert_eq!(order.items[0].name, "Biryani");
        assert!(!order.is_billed);

        app.put(&format!("/api/food-items/{}", biryani.id))
            .add_header(name.clone(), value.clone())
            .json(&json!({"price": 400, "name": "Chicken Biryani"}))
            .await
            .assert_status_ok();

        let order = app
            .get(&format!("/api/food-orders/{}", order.id))
            .add_header(name, value)
            .await
            .json::<ApiResponse<FoodOrderResponse>>()
            .data
            .unwrap();
        assert_eq!(order.items[0].name, "Biryani");
        assert_eq!(order.items[0].price, Decimal::from(250));
        assert_eq!(order.total_amount, Decimal::from(300));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_validation(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let admin = create_test_admin(&pool).await;
        let member = create_test_member(&pool, "M1").await;
        let tea = food_item(&pool, "Tea", 40).await;
        let (name, value) = auth_header(&admin);

        // No items
        app.post("/api/food-orders")
            .add_header(name.clone(), value.clone())
            .json(&json!({"memberId": member.id, "items": []}))
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        // Zero quantity
        app.post("/api/food-orders")
            .add_header(name.clone(), value.clone())
            .json(&json!({"memberId": member.id, "items": [{"foodItemId": tea.id, "quantity": 0}]}))
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        // Same item twice
        let response = app
            .post("/api/food-orders")
            .add_header(name.clone(), value.clone())
            .json(&json!({
                "memberId": member.id,
                "items": [{"foodItemId": tea.id, "quantity": 1}, {"foodItemId": tea.id, "quantity": 2}],
            }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let body: serde_json::Value = response.json();
        assert_eq!(body["message"], "Each food item may appear only once per order");

        // Unknown member
        app.post("/api/food-orders")
            .add_header(name.clone(), value.clone())
            .json(&json!({"memberId": uuid::Uuid::new_v4(), "items": [{"foodItemId": tea.id, "quantity": 1}]}))
            .await
            .assert_status(StatusCode::NOT_FOUND);

        // Inactive item
        app.delete(&format!("/api/food-items/{}", tea.id))
            .add_header(name.clone(), value.clone())
            .await
            .assert_status_ok();
        let response = app
            .post("/api/food-orders")
            .add_header(name, value)
            .json(&json!({"memberId": member.id, "items": [{"foodItemId": tea.id, "quantity": 1}]}))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let body: serde_json::Value = response.json();
        assert_eq!(body["message"], format!("Invalid or inactive food items: {}", tea.id));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_quantity_update_and_billed_lock(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let admin = create_test_admin(&pool).await;
        let member = create_test_member(&pool, "M1").await;
        let roti = food_item(&pool, "Roti", 20).await;
        let (name, value) = auth_header(&admin);

        let order = app
            .post("/api/food-orders")
            .add_header(name.clone(), value.clone())
            .json(&json!({"memberId": member.id, "items": [{"foodItemId": roti.id, "quantity": 2}]}))
            .await
            .json::<ApiResponse<FoodOrderResponse>>()
            .data
            .unwrap();
        let url = format!("/api/food-orders/{}", order.id);

        let response = app
            .put(&url)
            .add_header(name.clone(), value.clone())
            .json(&json!({"items": [{"foodItemId": roti.id, "quantity": 5}], "remarks": "extra"}))
            .await;
        response.assert_status_ok();
        let updated = response.json::<ApiResponse<FoodOrderResponse>>().data.unwrap();
        assert_eq!(updated.items[0].quantity, 5);
        assert_eq!(updated.total_amount, Decimal::from(100));

        let response = app
            .put(&format!("{url}/billing"))
            .add_header(name.clone(), value.clone())
            .await;
        response.assert_status_ok();
        assert!(response.json::<ApiResponse<FoodOrderResponse>>().data.unwrap().is_billed);

        let response = app
            .put(&url)
            .add_header(name.clone(), value.clone())
            .json(&json!({"remarks": "too late"}))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let body: serde_json::Value = response.json();
        assert_eq!(body["message"], "Billed order cannot be updated");

        app.delete(&url)
            .add_header(name.clone(), value.clone())
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        let body: ApiResponse<Vec<FoodOrderResponse>> = app
            .get("/api/food-orders?isBilled=true")
            .add_header(name, value)
            .await
            .json();
        assert_eq!(body.count, Some(1));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_member_orders_and_delete(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let admin = create_test_admin(&pool).await;
        let member = create_test_member(&pool, "M1").await;
        let other = create_test_member(&pool, "M2").await;
        let chai = food_item(&pool, "Chai", 30).await;
        let (name, value) = auth_header(&admin);

        let mut ids = Vec::new();
        for who in [member.id, member.id, other.id] {
            let order = app
                .post("/api/food-orders")
                .add_header(name.clone(), value.clone())
                .json(&json!({"memberId": who, "items": [{"foodItemId": chai.id, "quantity": 1}]}))
                .await
                .json::<ApiResponse<FoodOrderResponse>>()
                .data
                .unwrap();
            ids.push(order.id);
        }

        app.delete(&format!("/api/food-orders/{}", ids[0]))
            .add_header(name.clone(), value.clone())
            .await
            .assert_status_ok();

        let body: ApiResponse<Vec<FoodOrderResponse>> = app
            .get(&format!("/api/food-orders/member/{}", member.id))
            .add_header(name.clone(), value.clone())
            .await
            .json();
        assert_eq!(body.count, Some(1));
        assert_eq!(body.data.unwrap()[0].id, ids[1]);

        app.get(&format!("/api/food-orders/{}", ids[0]))
            .add_header(name, value)
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }
}
