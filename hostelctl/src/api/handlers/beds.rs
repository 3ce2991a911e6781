use crate::{
    AppState,
    api::JsonBody,
    api::models::{
        beds::{BedCreate, BedResponse, BedStatusUpdate, BedUpdate, ListBedsQuery},
        response::{ApiResponse, MessageResponse},
    },
    auth::permissions::{RequiresPermission, require},
    db::handlers::{Beds, Repository, Rooms, beds::BedFilter},
    db::models::beds::{BedCreateDBRequest, BedDBResponse, BedStatus, BedUpdateDBRequest},
    errors::{Error, Result},
    types::{BedId, Lifecycle, RoomId},
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use sqlx::PgConnection;

/// Lock the room and make sure it can take one more active bed.
async fn ensure_room_capacity(conn: &mut PgConnection, room_id: RoomId) -> Result<()> {
    let room = Rooms::new(conn)
        .lock(room_id)
        .await?
        .filter(|r| r.lifecycle.is_active())
        .ok_or_else(|| Error::bad_request("Room not found or inactive"))?;

    let active_beds = Beds::new(conn).count_active_in_room(room_id).await?;
    if active_beds >= i64::from(room.total_beds) {
        return Err(Error::bad_request(format!(
            "Room {} already has {} beds",
            room.room_number, room.total_beds
        )));
    }
    Ok(())
}

async fn lock_bed(conn: &mut PgConnection, id: BedId) -> Result<BedDBResponse> {
    Beds::new(conn).lock(id).await?.ok_or_else(|| Error::not_found("Bed", id))
}

#[utoipa::path(
    post,
    path = "/beds",
    request_body = BedCreate,
    tag = "beds",
    summary = "Create bed",
    responses(
        (status = 201, description = "Bed created", body = ApiResponse<BedResponse>),
        (status = 400, description = "Room missing, inactive or at capacity, or duplicate bed number"),
        (status = 403, description = "Missing BED_CREATE"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_bed(
    State(state): State<AppState>,
    current_user: RequiresPermission<require::BedCreate>,
    JsonBody(body): JsonBody<BedCreate>,
) -> Result<(StatusCode, Json<ApiResponse<BedResponse>>)> {
    let bed_number = body.bed_number.trim();
    if bed_number.is_empty() {
        return Err(Error::bad_request("Bed number and room are required"));
    }

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    ensure_room_capacity(&mut tx, body.room_id).await?;

    let bed = Beds::new(&mut tx)
        .create(&BedCreateDBRequest {
            bed_number: bed_number.to_string(),
            room_id: body.room_id,
            created_by: Some(current_user.id),
        })
        .await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message("Bed created successfully", BedResponse::from(bed))),
    ))
}

#[utoipa::path(
    get,
    path = "/beds",
    tag = "beds",
    summary = "List active beds",
    params(ListBedsQuery),
    responses(
        (status = 200, description = "Beds", body = ApiResponse<Vec<BedResponse>>),
        (status = 403, description = "Missing BED_VIEW"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_beds(
    State(state): State<AppState>,
    Query(query): Query<ListBedsQuery>,
    _: RequiresPermission<require::BedView>,
) -> Result<Json<ApiResponse<Vec<BedResponse>>>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let beds = Beds::new(&mut conn)
        .list(&BedFilter {
            room_id: query.room_id,
            status: query.status,
            lifecycle: Some(Lifecycle::Active),
        })
        .await?;

    Ok(Json(ApiResponse::list(beds.into_iter().map(BedResponse::from).collect())))
}

#[utoipa::path(
    get,
    path = "/beds/{id}",
    tag = "beds",
    summary = "Get bed",
    params(("id" = uuid::Uuid, Path, description = "Bed ID")),
    responses(
        (status = 200, description = "Bed", body = ApiResponse<BedResponse>),
        (status = 404, description = "Bed not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_bed(
    State(state): State<AppState>,
    Path(id): Path<BedId>,
    _: RequiresPermission<require::BedView>,
) -> Result<Json<ApiResponse<BedResponse>>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let bed = Beds::new(&mut conn)
        .get_by_id(id)
        .await?
        .ok_or_else(|| Error::not_found("Bed", id))?;

    Ok(Json(ApiResponse::data(BedResponse::from(bed))))
}

#[utoipa::path(
    get,
    path = "/beds/room/{roomId}",
    tag = "beds",
    summary = "List beds in a room",
    params(("roomId" = uuid::Uuid, Path, description = "Room ID")),
    responses(
        (status = 200, description = "Active beds of the room", body = ApiResponse<Vec<BedResponse>>),
        (status = 404, description = "Room not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_beds_by_room(
    State(state): State<AppState>,
    Path(room_id): Path<RoomId>,
    _: RequiresPermission<require::BedView>,
) -> Result<Json<ApiResponse<Vec<BedResponse>>>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    if Rooms::new(&mut conn).get_by_id(room_id).await?.is_none() {
        return Err(Error::not_found("Room", room_id));
    }

    let beds = Beds::new(&mut conn)
        .list(&BedFilter {
            room_id: Some(room_id),
            lifecycle: Some(Lifecycle::Active),
            ..Default::default()
        })
        .await?;

    Ok(Json(ApiResponse::list(beds.into_iter().map(BedResponse::from).collect())))
}

#[utoipa::path(
    put,
    path = "/beds/{id}",
    request_body = BedUpdate,
    tag = "beds",
    summary = "Rename bed",
    params(("id" = uuid::Uuid, Path, description = "Bed ID")),
    responses(
        (status = 200, description = "Updated bed", body = ApiResponse<BedResponse>),
        (status = 400, description = "Empty or duplicate bed number"),
        (status = 404, description = "Bed not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_bed(
    State(state): State<AppState>,
    Path(id): Path<BedId>,
    _: RequiresPermission<require::BedUpdate>,
    JsonBody(body): JsonBody<BedUpdate>,
) -> Result<Json<ApiResponse<BedResponse>>> {
    let bed_number = body.bed_number.trim();
    if bed_number.is_empty() {
        return Err(Error::bad_request("Bed number is required"));
    }

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut beds = Beds::new(&mut conn);
    if beds.get_by_id(id).await?.is_none() {
        return Err(Error::not_found("Bed", id));
    }
    let bed = beds
        .update(
            id,
            &BedUpdateDBRequest {
                bed_number: Some(bed_number.to_string()),
                ..Default::default()
            },
        )
        .await?;

    Ok(Json(ApiResponse::with_message("Bed updated successfully", BedResponse::from(bed))))
}

#[utoipa::path(
    patch,
    path = "/beds/{id}/status",
    request_body = BedStatusUpdate,
    tag = "beds",
    summary = "Set bed status",
    description = "Move a bed between AVAILABLE and MAINTENANCE. Occupancy only changes through bed assignments.",
    params(("id" = uuid::Uuid, Path, description = "Bed ID")),
    responses(
        (status = 200, description = "Updated bed", body = ApiResponse<BedResponse>),
        (status = 400, description = "Bed is occupied or status not allowed"),
        (status = 404, description = "Bed not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_bed_status(
    State(state): State<AppState>,
    Path(id): Path<BedId>,
    _: RequiresPermission<require::BedUpdate>,
    JsonBody(body): JsonBody<BedStatusUpdate>,
) -> Result<Json<ApiResponse<BedResponse>>> {
    if body.status == BedStatus::Occupied {
        return Err(Error::bad_request("Beds become occupied only through a bed assignment"));
    }

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let bed = lock_bed(&mut tx, id).await?;
    if bed.status == BedStatus::Occupied {
        return Err(Error::bad_request("An occupied bed can only be released by closing its assignment"));
    }

    Beds::new(&mut tx).set_status(id, body.status).await?;
    Rooms::new(&mut tx).recompute_status(bed.room_id).await?;
    let bed = Beds::new(&mut tx).get_by_id(id).await?.ok_or_else(|| Error::not_found("Bed", id))?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(ApiResponse::with_message("Bed status updated", BedResponse::from(bed))))
}

#[utoipa::path(
    patch,
    path = "/beds/{id}/activate",
    tag = "beds",
    summary = "Reactivate bed",
    params(("id" = uuid::Uuid, Path, description = "Bed ID")),
    responses(
        (status = 200, description = "Bed reactivated", body = ApiResponse<BedResponse>),
        (status = 400, description = "Bed already active or room at capacity"),
        (status = 404, description = "Bed not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn activate_bed(
    State(state): State<AppState>,
    Path(id): Path<BedId>,
    _: RequiresPermission<require::BedUpdate>,
) -> Result<Json<ApiResponse<BedResponse>>> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let bed = lock_bed(&mut tx, id).await?;
    if bed.lifecycle.is_active() {
        return Err(Error::bad_request("Bed is already active"));
    }
    ensure_room_capacity(&mut tx, bed.room_id).await?;

    let bed = Beds::new(&mut tx)
        .update(
            id,
            &BedUpdateDBRequest {
                lifecycle: Some(Lifecycle::Active),
                ..Default::default()
            },
        )
        .await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(ApiResponse::with_message("Bed activated", BedResponse::from(bed))))
}

#[utoipa::path(
    delete,
    path = "/beds/{id}",
    tag = "beds",
    summary = "Deactivate bed",
    params(("id" = uuid::Uuid, Path, description = "Bed ID")),
    responses(
        (status = 200, description = "Bed deactivated", body = MessageResponse),
        (status = 400, description = "Bed is occupied"),
        (status = 404, description = "Bed not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_bed(
    State(state): State<AppState>,
    Path(id): Path<BedId>,
    _: RequiresPermission<require::BedDelete>,
) -> Result<Json<MessageResponse>> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let bed = lock_bed(&mut tx, id).await?;
    if bed.status == BedStatus::Occupied {
        return Err(Error::bad_request("Cannot delete an occupied bed"));
    }

    Beds::new(&mut tx).delete(id).await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(MessageResponse::new("Bed deleted successfully")))
}

#[cfg(test)]
mod tests {
    use crate::{
        api::models::{beds::BedResponse, response::ApiResponse},
        db::handlers::Beds,
        db::models::beds::BedStatus,
        test_utils::*,
        types::PermissionKey,
    };
    use axum::http::StatusCode;
    use serde_json::json;
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_bed_respects_capacity(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let admin = create_test_user(&pool, &[PermissionKey::BedCreate]).await;
        let room = create_test_room(&pool, "A-1", 1, 5000).await;
        let (name, value) = auth_header(&admin);

        let response = app
            .post("/api/beds")
            .add_header(name.clone(), value.clone())
            .json(&json!({"bedNumber": "1", "roomId": room.id}))
            .await;
        response.assert_status(StatusCode::CREATED);
        let bed = response.json::<ApiResponse<BedResponse>>().data.unwrap();
        assert_eq!(bed.status, BedStatus::Available);
        assert_eq!(bed.room_number, "A-1");

        let response = app
            .post("/api/beds")
            .add_header(name, value)
            .json(&json!({"bedNumber": "2", "roomId": room.id}))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let body: serde_json::Value = response.json();
        assert_eq!(body["message"], "Room A-1 already has 1 beds");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_bed_validation(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let admin = create_test_user(&pool, &[PermissionKey::BedCreate]).await;
        let room = create_test_room(&pool, "A-1", 2, 5000).await;
        create_test_bed(&pool, room.id, "1").await;
        let (name, value) = auth_header(&admin);

        // Unknown room
        let response = app
            .post("/api/beds")
            .add_header(name.clone(), value.clone())
            .json(&json!({"bedNumber": "1", "roomId": uuid::Uuid::new_v4()}))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let body: serde_json::Value = response.json();
        assert_eq!(body["message"], "Room not found or inactive");

        // Duplicate number within the room
        let response = app
            .post("/api/beds")
            .add_header(name, value)
            .json(&json!({"bedNumber": "1", "roomId": room.id}))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let body: serde_json::Value = response.json();
        assert_eq!(body["message"], "Bed number already exists in this room");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_occupied_bed_status_is_locked(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let admin = create_test_user(&pool, &[PermissionKey::BedUpdate, PermissionKey::BedDelete]).await;
        let room = create_test_room(&pool, "A-1", 2, 5000).await;
        let free = create_test_bed(&pool, room.id, "1").await;
        let taken = create_test_bed(&pool, room.id, "2").await;
        let mut conn = pool.acquire().await.unwrap();
        Beds::new(&mut conn).set_status(taken.id, BedStatus::Occupied).await.unwrap();
        let (name, value) = auth_header(&admin);

        app.patch(&format!("/api/beds/{}/status", taken.id))
            .add_header(name.clone(), value.clone())
            .json(&json!({"status": "AVAILABLE"}))
            .await
            .assert_status(StatusCode::BAD_REQUEST);
        app.delete(&format!("/api/beds/{}", taken.id))
            .add_header(name.clone(), value.clone())
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        // Cannot be marked occupied by hand either
        app.patch(&format!("/api/beds/{}/status", free.id))
            .add_header(name.clone(), value.clone())
            .json(&json!({"status": "OCCUPIED"}))
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        let response = app
            .patch(&format!("/api/beds/{}/status", free.id))
            .add_header(name, value)
            .json(&json!({"status": "MAINTENANCE"}))
            .await;
        response.assert_status_ok();
        assert_eq!(
            response.json::<ApiResponse<BedResponse>>().data.unwrap().status,
            BedStatus::Maintenance
        );
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_delete_and_reactivate(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let admin = create_test_user(
            &pool,
            &[PermissionKey::BedUpdate, PermissionKey::BedDelete, PermissionKey::BedView],
        )
        .await;
        let room = create_test_room(&pool, "A-1", 2, 5000).await;
        let bed = create_test_bed(&pool, room.id, "1").await;
        let (name, value) = auth_header(&admin);

        app.patch(&format!("/api/beds/{}/activate", bed.id))
            .add_header(name.clone(), value.clone())
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        app.delete(&format!("/api/beds/{}", bed.id))
            .add_header(name.clone(), value.clone())
            .await
            .assert_status_ok();

        let body: ApiResponse<Vec<BedResponse>> = app
            .get(&format!("/api/beds/room/{}", room.id))
            .add_header(name.clone(), value.clone())
            .await
            .json();
        assert_eq!(body.count, Some(0));

        let response = app
            .patch(&format!("/api/beds/{}/activate", bed.id))
            .add_header(name.clone(), value.clone())
            .await;
        response.assert_status_ok();
        assert!(response.json::<ApiResponse<BedResponse>>().data.unwrap().is_active);

        let body: ApiResponse<Vec<BedResponse>> = app
            .get(&format!("/api/beds?roomId={}", room.id))
            .add_header(name, value)
            .await
            .json();
        assert_eq!(body.count, Some(1));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_beds_by_unknown_room(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let viewer = create_test_user(&pool, &[PermissionKey::BedView]).await;
        let (name, value) = auth_header(&viewer);

        app.get(&format!("/api/beds/room/{}", uuid::Uuid::new_v4()))
            .add_header(name, value)
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }
}
