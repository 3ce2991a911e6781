use crate::{
    AppState,
    api::JsonBody,
    api::models::{
        response::{ApiResponse, MessageResponse},
        rooms::{ListRoomsQuery, RoomCreate, RoomResponse, RoomStatusUpdate, RoomUpdate},
    },
    auth::permissions::{RequiresPermission, require},
    db::handlers::{Beds, Repository, Rooms, rooms::RoomFilter},
    db::models::rooms::{RoomCreateDBRequest, RoomStatus, RoomUpdateDBRequest},
    errors::{Error, Result},
    types::{Lifecycle, RoomId},
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use rust_decimal::Decimal;
use tracing::info;

#[utoipa::path(
    post,
    path = "/rooms",
    request_body = RoomCreate,
    tag = "rooms",
    summary = "Create room",
    responses(
        (status = 201, description = "Room created", body = ApiResponse<RoomResponse>),
        (status = 400, description = "Invalid fields or duplicate room number"),
        (status = 403, description = "Missing ROOM_CREATE"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_room(
    State(state): State<AppState>,
    current_user: RequiresPermission<require::RoomCreate>,
    JsonBody(body): JsonBody<RoomCreate>,
) -> Result<(StatusCode, Json<ApiResponse<RoomResponse>>)> {
    let room_number = body.room_number.trim();
    if room_number.is_empty() {
        return Err(Error::bad_request("Room number is required"));
    }
    if body.total_beds < 1 {
        return Err(Error::bad_request("Total beds must be at least 1"));
    }
    if body.rent_per_bed < Decimal::ZERO {
        return Err(Error::bad_request("Rent per bed cannot be negative"));
    }

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let room = Rooms::new(&mut conn)
        .create(&RoomCreateDBRequest {
            room_number: room_number.to_string(),
            floor: body.floor,
            total_beds: body.total_beds,
            room_type: body.room_type,
            rent_per_bed: body.rent_per_bed,
            has_ac: body.has_ac,
            has_washroom: body.has_washroom,
            created_by: Some(current_user.id),
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message("Room created successfully", RoomResponse::from(room))),
    ))
}

#[utoipa::path(
    get,
    path = "/rooms",
    tag = "rooms",
    summary = "List active rooms",
    params(ListRoomsQuery),
    responses(
        (status = 200, description = "Rooms ordered by floor then number", body = ApiResponse<Vec<RoomResponse>>),
        (status = 403, description = "Missing ROOM_VIEW"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_rooms(
    State(state): State<AppState>,
    Query(query): Query<ListRoomsQuery>,
    _: RequiresPermission<require::RoomView>,
) -> Result<Json<ApiResponse<Vec<RoomResponse>>>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let rooms = Rooms::new(&mut conn)
        .list(&RoomFilter {
            status: query.status,
            room_type: query.room_type,
            floor: query.floor,
            lifecycle: Some(Lifecycle::Active),
        })
        .await?;

    Ok(Json(ApiResponse::list(rooms.into_iter().map(RoomResponse::from).collect())))
}

#[utoipa::path(
    get,
    path = "/rooms/{id}",
    tag = "rooms",
    summary = "Get room",
    params(("id" = uuid::Uuid, Path, description = "Room ID")),
    responses(
        (status = 200, description = "Room", body = ApiResponse<RoomResponse>),
        (status = 404, description = "Room not found or inactive"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_room(
    State(state): State<AppState>,
    Path(id): Path<RoomId>,
    _: RequiresPermission<require::RoomView>,
) -> Result<Json<ApiResponse<RoomResponse>>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let room = Rooms::new(&mut conn)
        .get_by_id(id)
        .await?
        .filter(|r| r.lifecycle.is_active())
        .ok_or_else(|| Error::not_found("Room", id))?;

    Ok(Json(ApiResponse::data(RoomResponse::from(room))))
}

#[utoipa::path(
    put,
    path = "/rooms/{id}",
    request_body = RoomUpdate,
    tag = "rooms",
    summary = "Update room",
    params(("id" = uuid::Uuid, Path, description = "Room ID")),
    responses(
        (status = 200, description = "Updated room", body = ApiResponse<RoomResponse>),
        (status = 400, description = "Capacity below occupancy or invalid fields"),
        (status = 404, description = "Room not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_room(
    State(state): State<AppState>,
    Path(id): Path<RoomId>,
    _: RequiresPermission<require::RoomUpdate>,
    JsonBody(body): JsonBody<RoomUpdate>,
) -> Result<Json<ApiResponse<RoomResponse>>> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let mut rooms = Rooms::new(&mut tx);

    let room = rooms
        .lock(id)
        .await?
        .filter(|r| r.lifecycle.is_active())
        .ok_or_else(|| Error::not_found("Room", id))?;

    if let Some(total_beds) = body.total_beds {
        if total_beds < 1 {
            return Err(Error::bad_request("Total beds must be at least 1"));
        }
        if i64::from(total_beds) < room.occupied_beds {
            return Err(Error::bad_request(format!(
                "Total beds cannot be less than occupied beds ({})",
                room.occupied_beds
            )));
        }
    }
    if body.rent_per_bed.is_some_and(|rent| rent < Decimal::ZERO) {
        return Err(Error::bad_request("Rent per bed cannot be negative"));
    }

    rooms
        .update(
            id,
            &RoomUpdateDBRequest {
                room_number: body.room_number.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
                floor: body.floor,
                total_beds: body.total_beds,
                room_type: body.room_type,
                rent_per_bed: body.rent_per_bed,
                has_ac: body.has_ac,
                has_washroom: body.has_washroom,
                ..Default::default()
            },
        )
        .await?;
    // Capacity changes can move the room between FULL and AVAILABLE
    rooms.recompute_status(id).await?;
    let room = rooms.get_by_id(id).await?.ok_or_else(|| Error::not_found("Room", id))?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(ApiResponse::with_message("Room updated successfully", RoomResponse::from(room))))
}

#[utoipa::path(
    patch,
    path = "/rooms/{id}/status",
    request_body = RoomStatusUpdate,
    tag = "rooms",
    summary = "Set room status",
    description = "Put a room into MAINTENANCE, or take it out again. Outside maintenance the status \
                   must match what the occupied bed count implies.",
    params(("id" = uuid::Uuid, Path, description = "Room ID")),
    responses(
        (status = 200, description = "Updated room", body = ApiResponse<RoomResponse>),
        (status = 400, description = "Status contradicts occupancy"),
        (status = 404, description = "Room not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_room_status(
    State(state): State<AppState>,
    Path(id): Path<RoomId>,
    _: RequiresPermission<require::RoomUpdate>,
    JsonBody(body): JsonBody<RoomStatusUpdate>,
) -> Result<Json<ApiResponse<RoomResponse>>> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let mut rooms = Rooms::new(&mut tx);

    let room = rooms
        .lock(id)
        .await?
        .filter(|r| r.lifecycle.is_active())
        .ok_or_else(|| Error::not_found("Room", id))?;

    let status = match body.status {
        RoomStatus::Maintenance => RoomStatus::Maintenance,
        requested => {
            let derived = RoomStatus::derive(RoomStatus::Available, room.occupied_beds, room.total_beds);
            if requested != derived {
                return Err(Error::bad_request(format!(
                    "Status must match occupancy ({} of {} beds occupied)",
                    room.occupied_beds, room.total_beds
                )));
            }
            derived
        }
    };

    let room = rooms
        .update(
            id,
            &RoomUpdateDBRequest {
                status: Some(status),
                ..Default::default()
            },
        )
        .await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;
    info!(room_id = %id, status = ?status, "room status set");

    Ok(Json(ApiResponse::with_message("Room status updated", RoomResponse::from(room))))
}

#[utoipa::path(
    delete,
    path = "/rooms/{id}",
    tag = "rooms",
    summary = "Deactivate room",
    params(("id" = uuid::Uuid, Path, description = "Room ID")),
    responses(
        (status = 200, description = "Room deactivated", body = MessageResponse),
        (status = 400, description = "Room has occupied beds"),
        (status = 404, description = "Room not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_room(
    State(state): State<AppState>,
    Path(id): Path<RoomId>,
    _: RequiresPermission<require::RoomDelete>,
) -> Result<Json<MessageResponse>> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

    Rooms::new(&mut tx)
        .lock(id)
        .await?
        .filter(|r| r.lifecycle.is_active())
        .ok_or_else(|| Error::not_found("Room", id))?;

    if Beds::new(&mut tx).room_has_occupied(id).await? {
        return Err(Error::bad_request("Cannot delete a room with occupied beds"));
    }

    Rooms::new(&mut tx).delete(id).await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(MessageResponse::new("Room deleted successfully")))
}
