//! Bill generation and payments.
//!
//! A bill is assembled once, inside one transaction, from three sources: the rent snapshot of the
//! member's active billable assignment, a single mess line summing every unbilled food order, and
//! caller-supplied extras. The consumed orders are stamped with the bill's id so deleting an
//! unpaid bill can hand them back.

use crate::{
    AppState,
    api::JsonBody,
    api::models::{
        bills::{BillCreate, BillPayment, BillResponse, BillUpdate, ListBillsQuery},
        response::{ApiResponse, MessageResponse},
    },
    auth::permissions::{RequiresPermission, require},
    db::handlers::{BedAssignments, Bills, FoodOrders, Members, Repository, bills::BillFilter},
    db::models::bills::{
        BillCreateDBRequest, BillItem, BillStatus, BillUpdateDBRequest, MESS_CHARGES_TITLE, ROOM_RENT_TITLE,
        current_bill_month, is_valid_bill_month,
    },
    errors::{Error, Result},
    types::BillId,
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use rust_decimal::Decimal;
use tracing::info;

fn check_items(items: &[BillItem]) -> Result<()> {
    if items.iter().any(|item| item.title.trim().is_empty()) {
        return Err(Error::bad_request("Every bill item needs a title"));
    }
    if items.iter().any(|item| item.amount < Decimal::ZERO) {
        return Err(Error::bad_request("Bill item amounts cannot be negative"));
    }
    Ok(())
}

#[utoipa::path(
    post,
    path = "/bills",
    request_body = BillCreate,
    tag = "bills",
    summary = "Generate bill",
    description = "Collects room rent, unbilled mess charges and extra items for a member. \
                   Consumed food orders are marked billed.",
    responses(
        (status = 201, description = "Bill created", body = ApiResponse<BillResponse>),
        (status = 400, description = "Bad month, or nothing to bill"),
        (status = 404, description = "Member not found"),
        (status = 403, description = "Missing BILL_CREATE"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_bill(
    State(state): State<AppState>,
    current_user: RequiresPermission<require::BillCreate>,
    JsonBody(body): JsonBody<BillCreate>,
) -> Result<(StatusCode, Json<ApiResponse<BillResponse>>)> {
    let bill_month = match body.bill_month {
        Some(month) if is_valid_bill_month(&month) => month,
        Some(_) => return Err(Error::bad_request("billMonth must be in YYYY-MM format")),
        None => current_bill_month(),
    };
    check_items(&body.extra_items)?;

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

    let member = Members::new(&mut tx)
        .lock(body.member_id)
        .await?
        .filter(|m| m.lifecycle.is_active())
        .ok_or_else(|| Error::not_found("Member", body.member_id))?;

    let mut items = Vec::new();

    if let Some(assignment) = BedAssignments::new(&mut tx).active_billable_for_member(member.id).await? {
        items.push(BillItem {
            title: ROOM_RENT_TITLE.to_string(),
            amount: assignment.rent_at_assignment,
        });
    }

    let orders = FoodOrders::new(&mut tx).lock_unbilled_for_member(member.id).await?;
    if !orders.is_empty() {
        items.push(BillItem {
            title: MESS_CHARGES_TITLE.to_string(),
            amount: orders.iter().map(|o| o.total_amount).sum(),
        });
    }

    items.extend(body.extra_items.into_iter().filter(|item| item.amount > Decimal::ZERO));

    if items.is_empty() {
        return Err(Error::bad_request("Nothing to bill for this member"));
    }

    let bill = Bills::new(&mut tx)
        .create(&BillCreateDBRequest {
            member_id: member.id,
            bill_month,
            items,
            remarks: body.remarks,
            generated_by: Some(current_user.id),
        })
        .await?;

    let order_ids: Vec<_> = orders.iter().map(|o| o.id).collect();
    FoodOrders::new(&mut tx).mark_billed(&order_ids, Some(bill.id)).await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    info!(
        bill_number = %bill.bill_number,
        member_id = %bill.member_id,
        orders = order_ids.len(),
        total = %bill.total_amount,
        "bill generated"
    );

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message("Bill generated successfully", BillResponse::from(bill))),
    ))
}

#[utoipa::path(
    get,
    path = "/bills",
    tag = "bills",
    summary = "List bills",
    params(ListBillsQuery),
    responses(
        (status = 200, description = "Bills, newest first", body = ApiResponse<Vec<BillResponse>>),
        (status = 403, description = "Missing BILL_VIEW"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_bills(
    State(state): State<AppState>,
    Query(query): Query<ListBillsQuery>,
    _: RequiresPermission<require::BillView>,
) -> Result<Json<ApiResponse<Vec<BillResponse>>>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let bills = Bills::new(&mut conn)
        .list(&BillFilter {
            member_id: query.member_id,
            bill_month: query.bill_month,
            status: query.status,
        })
        .await?;

    Ok(Json(ApiResponse::list(bills.into_iter().map(BillResponse::from).collect())))
}

#[utoipa::path(
    get,
    path = "/bills/{id}",
    tag = "bills",
    summary = "Get bill",
    params(("id" = uuid::Uuid, Path, description = "Bill ID")),
    responses(
        (status = 200, description = "Bill", body = ApiResponse<BillResponse>),
        (status = 404, description = "Bill not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_bill(
    State(state): State<AppState>,
    Path(id): Path<BillId>,
    _: RequiresPermission<require::BillView>,
) -> Result<Json<ApiResponse<BillResponse>>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let bill = Bills::new(&mut conn)
        .get_by_id(id)
        .await?
        .ok_or_else(|| Error::not_found("Bill", id))?;

    Ok(Json(ApiResponse::data(BillResponse::from(bill))))
}

#[utoipa::path(
    put,
    path = "/bills/{id}",
    request_body = BillUpdate,
    tag = "bills",
    summary = "Update unpaid bill",
    params(("id" = uuid::Uuid, Path, description = "Bill ID")),
    responses(
        (status = 200, description = "Updated bill", body = ApiResponse<BillResponse>),
        (status = 400, description = "Bill already paid, or invalid items"),
        (status = 404, description = "Bill not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_bill(
    State(state): State<AppState>,
    Path(id): Path<BillId>,
    _: RequiresPermission<require::BillUpdate>,
    JsonBody(body): JsonBody<BillUpdate>,
) -> Result<Json<ApiResponse<BillResponse>>> {
    if let Some(items) = &body.items {
        check_items(items)?;
    }

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let mut bills = Bills::new(&mut tx);

    let current = bills.lock(id).await?.ok_or_else(|| Error::not_found("Bill", id))?;
    if current.status == BillStatus::Paid {
        return Err(Error::conflict("Paid bill cannot be modified"));
    }

    let bill = bills
        .update(
            id,
            &BillUpdateDBRequest {
                items: body.items,
                remarks: body.remarks,
                paid_amount: None,
            },
        )
        .await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(ApiResponse::with_message("Bill updated successfully", BillResponse::from(bill))))
}

#[utoipa::path(
    post,
    path = "/bills/{id}/payment",
    request_body = BillPayment,
    tag = "bills",
    summary = "Record payment",
    description = "Adds to the paid amount and re-derives due and status.",
    params(("id" = uuid::Uuid, Path, description = "Bill ID")),
    responses(
        (status = 200, description = "Payment recorded", body = ApiResponse<BillResponse>),
        (status = 400, description = "Invalid payment amount"),
        (status = 404, description = "Bill not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn add_payment(
    State(state): State<AppState>,
    Path(id): Path<BillId>,
    _: RequiresPermission<require::BillPayment>,
    JsonBody(body): JsonBody<BillPayment>,
) -> Result<Json<ApiResponse<BillResponse>>> {
    if body.amount <= Decimal::ZERO {
        return Err(Error::bad_request("Invalid payment amount"));
    }

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let mut bills = Bills::new(&mut tx);

    let current = bills.lock(id).await?.ok_or_else(|| Error::not_found("Bill", id))?;
    let bill = bills
        .update(
            id,
            &BillUpdateDBRequest {
                paid_amount: Some(current.paid_amount + body.amount),
                ..Default::default()
            },
        )
        .await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    info!(bill_number = %bill.bill_number, amount = %body.amount, status = ?bill.status, "payment recorded");

    Ok(Json(ApiResponse::with_message("Payment added successfully", BillResponse::from(bill))))
}

#[utoipa::path(
    delete,
    path = "/bills/{id}",
    tag = "bills",
    summary = "Delete unpaid bill",
    description = "Food orders consumed by the bill become unbilled again.",
    params(("id" = uuid::Uuid, Path, description = "Bill ID")),
    responses(
        (status = 200, description = "Bill deleted", body = MessageResponse),
        (status = 400, description = "Bill has payments"),
        (status = 404, description = "Bill not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_bill(
    State(state): State<AppState>,
    Path(id): Path<BillId>,
    _: RequiresPermission<require::BillDelete>,
) -> Result<Json<MessageResponse>> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

    let bill = Bills::new(&mut tx).lock(id).await?.ok_or_else(|| Error::not_found("Bill", id))?;
    if bill.paid_amount > Decimal::ZERO {
        return Err(Error::conflict("Cannot delete a bill with payments"));
    }

    let released = FoodOrders::new(&mut tx).release_for_bill(id).await?;
    Bills::new(&mut tx).delete(id).await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    info!(bill_number = %bill.bill_number, released, "bill deleted");

    Ok(Json(MessageResponse::new("Bill deleted successfully")))
}
