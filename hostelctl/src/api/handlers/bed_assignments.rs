//! Bed assignment workflow.
//!
//! Creating and closing an assignment touch four rows: the assignment, the bed, the member and the
//! room. Both run in a single transaction and lock member, assignment, bed and room in that order,
//! the same order a member moving to LEFT uses. The room status is re-derived from its occupied
//! beds before commit.

use crate::{
    AppState,
    api::JsonBody,
    api::models::{
        bed_assignments::{BedAssignmentCreate, BedAssignmentResponse, BedAssignmentUpdate, ListBedAssignmentsQuery},
        response::{ApiResponse, MessageResponse},
    },
    auth::permissions::{RequiresPermission, require},
    db::handlers::{
        BedAssignments, Beds, Members, Repository, Rooms,
        bed_assignments::{BedAssignmentFilter, release_placement},
    },
    db::models::{
        bed_assignments::{AssignmentStatus, BedAssignmentCreateDBRequest, BedAssignmentUpdateDBRequest},
        beds::BedStatus,
        members::MemberStatus,
        rooms::RoomStatus,
    },
    errors::{Error, Result},
    types::{BedAssignmentId, MemberId},
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use tracing::info;

#[utoipa::path(
    post,
    path = "/bed-assignments",
    request_body = BedAssignmentCreate,
    tag = "bed-assignments",
    summary = "Assign a member to a bed",
    responses(
        (status = 201, description = "Assignment created", body = ApiResponse<BedAssignmentResponse>),
        (status = 400, description = "Member already placed, bed unavailable or room full"),
        (status = 404, description = "Member or bed not found"),
        (status = 403, description = "Missing ASSIGN_BED"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_assignment(
    State(state): State<AppState>,
    current_user: RequiresPermission<require::AssignBed>,
    JsonBody(body): JsonBody<BedAssignmentCreate>,
) -> Result<(StatusCode, Json<ApiResponse<BedAssignmentResponse>>)> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

    Members::new(&mut tx)
        .lock(body.member_id)
        .await?
        .filter(|m| m.lifecycle.is_active())
        .ok_or_else(|| Error::not_found("Member", body.member_id))?;
    if BedAssignments::new(&mut tx)
        .lock_active_for_member(body.member_id)
        .await?
        .is_some()
    {
        return Err(Error::conflict("Member already has an active bed assignment"));
    }

    let bed = Beds::new(&mut tx)
        .lock(body.bed_id)
        .await?
        .filter(|b| b.lifecycle.is_active())
        .ok_or_else(|| Error::not_found("Bed", body.bed_id))?;
    if bed.status != BedStatus::Available {
        return Err(Error::conflict("Bed is not available"));
    }

    let room = Rooms::new(&mut tx)
        .lock(bed.room_id)
        .await?
        .filter(|r| r.lifecycle.is_active())
        .ok_or_else(|| Error::bad_request("Room of this bed is inactive"))?;
    if room.status == RoomStatus::Maintenance {
        return Err(Error::conflict("Room is under maintenance"));
    }
    if room.occupied_beds >= i64::from(room.total_beds) {
        return Err(Error::conflict("Room is full"));
    }

    let created = BedAssignments::new(&mut tx)
        .create(&BedAssignmentCreateDBRequest {
            member_id: body.member_id,
            bed_id: bed.id,
            room_id: room.id,
            rent_at_assignment: room.rent_per_bed,
            billable: body.billable.unwrap_or(true),
            remarks: body.remarks,
            assigned_by: Some(current_user.id),
        })
        .await?;

    Beds::new(&mut tx).set_status(bed.id, BedStatus::Occupied).await?;
    Members::new(&mut tx)
        .set_placement(body.member_id, Some(bed.id), Some(room.id), MemberStatus::Active)
        .await?;
    let room_status = Rooms::new(&mut tx).recompute_status(room.id).await?;

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;
    info!(
        assignment_id = %created.id,
        member_id = %created.member_id,
        bed_id = %created.bed_id,
        room_status = ?room_status,
        "bed assigned"
    );

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(
            "Bed assigned successfully",
            BedAssignmentResponse::from(created),
        )),
    ))
}

#[utoipa::path(
    get,
    path = "/bed-assignments",
    tag = "bed-assignments",
    summary = "List assignments",
    params(ListBedAssignmentsQuery),
    responses(
        (status = 200, description = "Assignments, newest first", body = ApiResponse<Vec<BedAssignmentResponse>>),
        (status = 403, description = "Missing VIEW_BED_ASSIGNMENTS"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_assignments(
    State(state): State<AppState>,
    Query(query): Query<ListBedAssignmentsQuery>,
    _: RequiresPermission<require::ViewBedAssignments>,
) -> Result<Json<ApiResponse<Vec<BedAssignmentResponse>>>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let assignments = BedAssignments::new(&mut conn)
        .list(&BedAssignmentFilter {
            status: query.status,
            member_id: query.member_id,
            bed_id: query.bed_id,
        })
        .await?;

    Ok(Json(ApiResponse::list(
        assignments.into_iter().map(BedAssignmentResponse::from).collect(),
    )))
}

#[utoipa::path(
    get,
    path = "/bed-assignments/{id}",
    tag = "bed-assignments",
    summary = "Get assignment",
    params(("id" = uuid::Uuid, Path, description = "Assignment ID")),
    responses(
        (status = 200, description = "Assignment", body = ApiResponse<BedAssignmentResponse>),
        (status = 404, description = "Assignment not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_assignment(
    State(state): State<AppState>,
    Path(id): Path<BedAssignmentId>,
    _: RequiresPermission<require::ViewBedAssignments>,
) -> Result<Json<ApiResponse<BedAssignmentResponse>>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let assignment = BedAssignments::new(&mut conn)
        .get_by_id(id)
        .await?
        .ok_or_else(|| Error::not_found("Bed assignment", id))?;

    Ok(Json(ApiResponse::data(BedAssignmentResponse::from(assignment))))
}

#[utoipa::path(
    get,
    path = "/bed-assignments/member/{memberId}",
    tag = "bed-assignments",
    summary = "Assignment history of a member",
    params(("memberId" = uuid::Uuid, Path, description = "Member ID")),
    responses(
        (status = 200, description = "Assignments, newest first", body = ApiResponse<Vec<BedAssignmentResponse>>),
        (status = 404, description = "Member not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_member_assignments(
    State(state): State<AppState>,
    Path(member_id): Path<MemberId>,
    _: RequiresPermission<require::ViewBedAssignments>,
) -> Result<Json<ApiResponse<Vec<BedAssignmentResponse>>>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    if Members::new(&mut conn).get_by_id(member_id).await?.is_none() {
        return Err(Error::not_found("Member", member_id));
    }

    let assignments = BedAssignments::new(&mut conn)
        .list(&BedAssignmentFilter {
            member_id: Some(member_id),
            ..Default::default()
        })
        .await?;

    Ok(Json(ApiResponse::list(
        assignments.into_iter().map(BedAssignmentResponse::from).collect(),
    )))
}

#[utoipa::path(
    put,
    path = "/bed-assignments/{id}/close",
    tag = "bed-assignments",
    summary = "Close assignment",
    description = "Ends the stay: the bed becomes AVAILABLE, the room status is re-derived and the member moves to ON_LEAVE.",
    params(("id" = uuid::Uuid, Path, description = "Assignment ID")),
    responses(
        (status = 200, description = "Closed assignment", body = ApiResponse<BedAssignmentResponse>),
        (status = 404, description = "No active assignment with this ID"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn close_assignment(
    State(state): State<AppState>,
    Path(id): Path<BedAssignmentId>,
    _: RequiresPermission<require::CloseBedAssignments>,
) -> Result<Json<ApiResponse<BedAssignmentResponse>>> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

    let member_id = BedAssignments::new(&mut tx)
        .get_by_id(id)
        .await?
        .filter(|a| a.status == AssignmentStatus::Active)
        .map(|a| a.member_id)
        .ok_or_else(|| Error::not_found("Active bed assignment", id))?;

    // Member before assignment, the same order as assign and member LEFT
    Members::new(&mut tx).lock(member_id).await?;
    BedAssignments::new(&mut tx)
        .lock(id)
        .await?
        .filter(|a| a.status == AssignmentStatus::Active)
        .ok_or_else(|| Error::not_found("Active bed assignment", id))?;

    let closed = BedAssignments::new(&mut tx).close(id).await?;
    release_placement(&mut tx, &closed, MemberStatus::OnLeave).await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;
    info!(assignment_id = %id, bed_id = %closed.bed_id, "bed assignment closed");

    Ok(Json(ApiResponse::with_message(
        "Bed assignment closed successfully",
        BedAssignmentResponse::from(closed),
    )))
}

#[utoipa::path(
    put,
    path = "/bed-assignments/{id}",
    request_body = BedAssignmentUpdate,
    tag = "bed-assignments",
    summary = "Update assignment remarks or billing",
    params(("id" = uuid::Uuid, Path, description = "Assignment ID")),
    responses(
        (status = 200, description = "Updated assignment", body = ApiResponse<BedAssignmentResponse>),
        (status = 404, description = "Assignment not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_assignment(
    State(state): State<AppState>,
    Path(id): Path<BedAssignmentId>,
    _: RequiresPermission<require::UpdateBedAssignments>,
    JsonBody(body): JsonBody<BedAssignmentUpdate>,
) -> Result<Json<ApiResponse<BedAssignmentResponse>>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = BedAssignments::new(&mut conn);
    if repo.get_by_id(id).await?.is_none() {
        return Err(Error::not_found("Bed assignment", id));
    }

    let assignment = repo
        .update(
            id,
            &BedAssignmentUpdateDBRequest {
                remarks: body.remarks,
                billable: body.billable,
            },
        )
        .await?;

    Ok(Json(ApiResponse::with_message(
        "Bed assignment updated successfully",
        BedAssignmentResponse::from(assignment),
    )))
}

#[utoipa::path(
    delete,
    path = "/bed-assignments/{id}",
    tag = "bed-assignments",
    summary = "Delete closed assignment",
    params(("id" = uuid::Uuid, Path, description = "Assignment ID")),
    responses(
        (status = 200, description = "Assignment deleted", body = MessageResponse),
        (status = 400, description = "Assignment is still active"),
        (status = 404, description = "Assignment not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_assignment(
    State(state): State<AppState>,
    Path(id): Path<BedAssignmentId>,
    _: RequiresPermission<require::DeleteBedAssignments>,
) -> Result<Json<MessageResponse>> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = BedAssignments::new(&mut tx);

    let assignment = repo.lock(id).await?.ok_or_else(|| Error::not_found("Bed assignment", id))?;
    if assignment.status == AssignmentStatus::Active {
        return Err(Error::conflict("Close the assignment before deleting it"));
    }

    repo.delete(id).await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(MessageResponse::new("Bed assignment deleted successfully")))
}
