use crate::{
    AppState,
    api::JsonBody,
    api::models::{
        attendance::{AttendanceResponse, AttendanceSheetEntry, MarkBulkAttendance, RoomAttendanceQuery, SheetQuery},
        response::{ApiResponse, MessageResponse},
    },
    auth::permissions::{RequiresPermission, require},
    db::handlers::{Attendance, Members, Repository},
    db::models::attendance::{AttendanceStatus, AttendanceUpsertDBRequest},
    errors::{Error, Result},
    types::{AttendanceId, MemberId},
};
use axum::{
    Json,
    extract::{Path, Query, State},
};
use std::collections::HashSet;
use tracing::info;

#[utoipa::path(
    post,
    path = "/attendance/mark-bulk",
    request_body = MarkBulkAttendance,
    tag = "attendance",
    summary = "Mark attendance sheet",
    description = "Writes one mark per member for the date. Marking the same member and date again \
                   overwrites the earlier mark.",
    responses(
        (status = 200, description = "Marks written", body = ApiResponse<Vec<AttendanceResponse>>),
        (status = 400, description = "Empty sheet, duplicate or unknown members"),
        (status = 403, description = "Missing ATTENDANCE_MARK"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn mark_bulk(
    State(state): State<AppState>,
    current_user: RequiresPermission<require::AttendanceMark>,
    JsonBody(body): JsonBody<MarkBulkAttendance>,
) -> Result<Json<ApiResponse<Vec<AttendanceResponse>>>> {
    if body.records.is_empty() {
        return Err(Error::bad_request("At least one attendance record is required"));
    }

    let mut seen = HashSet::new();
    if let Some(dup) = body.records.iter().find(|r| !seen.insert(r.member_id)) {
        return Err(Error::bad_request(format!("Member {} appears more than once", dup.member_id)));
    }

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

    let ids: Vec<MemberId> = body.records.iter().map(|r| r.member_id).collect();
    let members = Members::new(&mut tx).get_bulk(ids).await?;
    let unknown: Vec<String> = body
        .records
        .iter()
        .filter(|r| !members.get(&r.member_id).is_some_and(|m| m.lifecycle.is_active()))
        .map(|r| r.member_id.to_string())
        .collect();
    if !unknown.is_empty() {
        return Err(Error::bad_request(format!("Unknown or inactive members: {}", unknown.join(", "))));
    }

    let mut written = Vec::with_capacity(body.records.len());
    for record in body.records {
        let member = &members[&record.member_id];
        let id = Attendance::new(&mut tx)
            .upsert(&AttendanceUpsertDBRequest {
                member_id: record.member_id,
                room_id: record.room_id.or(member.current_room_id),
                bed_id: record.bed_id.or(member.current_bed_id),
                date: body.date,
                status: record.status.unwrap_or(AttendanceStatus::Present),
                remarks: record.remarks,
                marked_by: Some(current_user.id),
            })
            .await?;
        written.push(id);
    }

    let records = Attendance::new(&mut tx).get_many(&written).await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    info!(date = %body.date, count = records.len(), "attendance marked");

    let mut response = ApiResponse::list(records.into_iter().map(AttendanceResponse::from).collect());
    response.message = Some("Attendance marked successfully".to_string());
    Ok(Json(response))
}

#[utoipa::path(
    get,
    path = "/attendance/sheet",
    tag = "attendance",
    summary = "Daily sheet",
    description = "Every resident with an active bed assignment, with the day's mark if one exists.",
    params(SheetQuery),
    responses(
        (status = 200, description = "Sheet rows ordered by room then bed", body = ApiResponse<Vec<AttendanceSheetEntry>>),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_sheet(
    State(state): State<AppState>,
    Query(query): Query<SheetQuery>,
    _: RequiresPermission<require::AttendanceView>,
) -> Result<Json<ApiResponse<Vec<AttendanceSheetEntry>>>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let rows = Attendance::new(&mut conn).sheet(query.date).await?;

    Ok(Json(ApiResponse::list(rows.into_iter().map(AttendanceSheetEntry::from).collect())))
}

#[utoipa::path(
    get,
    path = "/attendance/member/{memberId}",
    tag = "attendance",
    summary = "Member history",
    params(("memberId" = uuid::Uuid, Path, description = "Member ID")),
    responses(
        (status = 200, description = "Marks, newest date first", body = ApiResponse<Vec<AttendanceResponse>>),
        (status = 404, description = "Member not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn member_history(
    State(state): State<AppState>,
    Path(member_id): Path<MemberId>,
    _: RequiresPermission<require::AttendanceView>,
) -> Result<Json<ApiResponse<Vec<AttendanceResponse>>>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    if Members::new(&mut conn).get_by_id(member_id).await?.is_none() {
        return Err(Error::not_found("Member", member_id));
    }

    let records = Attendance::new(&mut conn).for_member(member_id).await?;
    Ok(Json(ApiResponse::list(records.into_iter().map(AttendanceResponse::from).collect())))
}

#[utoipa::path(
    get,
    path = "/attendance/room",
    tag = "attendance",
    summary = "Room attendance for a day",
    params(RoomAttendanceQuery),
    responses(
        (status = 200, description = "Marks in the room", body = ApiResponse<Vec<AttendanceResponse>>),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn room_attendance(
    State(state): State<AppState>,
    Query(query): Query<RoomAttendanceQuery>,
    _: RequiresPermission<require::AttendanceView>,
) -> Result<Json<ApiResponse<Vec<AttendanceResponse>>>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let records = Attendance::new(&mut conn).for_room(query.room_id, query.date).await?;

    Ok(Json(ApiResponse::list(records.into_iter().map(AttendanceResponse::from).collect())))
}

#[utoipa::path(
    delete,
    path = "/attendance/{id}",
    tag = "attendance",
    summary = "Delete mark",
    params(("id" = uuid::Uuid, Path, description = "Attendance ID")),
    responses(
        (status = 200, description = "Mark deleted", body = MessageResponse),
        (status = 404, description = "Attendance not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_attendance(
    State(state): State<AppState>,
    Path(id): Path<AttendanceId>,
    _: RequiresPermission<require::AttendanceDelete>,
) -> Result<Json<MessageResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    if !Attendance::new(&mut conn).delete(id).await? {
        return Err(Error::not_found("Attendance", id));
    }

    Ok(Json(MessageResponse::new("Attendance deleted successfully")))
}

#[cfg(test)]
mod tests {
    use crate::{
        api::models::{
            attendance::{AttendanceResponse, AttendanceSheetEntry},
            response::ApiResponse,
        },
        db::models::attendance::AttendanceStatus,
        test_utils::*,
    };
    use axum::http::StatusCode;
    use serde_json::json;
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_mark_bulk_is_idempotent(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let admin = create_test_admin(&pool).await;
        let (name, value) = auth_header(&admin);
        let room = create_test_room(&pool, "R1", 2, 4000).await;
        let bed = create_test_bed(&pool, room.id, "B1").await;
        let member = create_test_member(&pool, "M1").await;

        app.post("/api/bed-assignments")
            .add_header(name.clone(), value.clone())
            .json(&json!({"memberId": member.id, "bedId": bed.id}))
            .await
            .assert_status(StatusCode::CREATED);

        let first = app
            .post("/api/attendance/mark-bulk")
            .add_header(name.clone(), value.clone())
            .json(&json!({"date": "2026-10-01", "records": [{"memberId": member.id}]}))
            .await
            .json::<ApiResponse<Vec<AttendanceResponse>>>()
            .data
            .unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].status, AttendanceStatus::Present);
        // Placement is filled in from the member
        assert_eq!(first[0].room_id, Some(room.id));
        assert_eq!(first[0].bed_id, Some(bed.id));

        let second = app
            .post("/api/attendance/mark-bulk")
            .add_header(name.clone(), value.clone())
            // A timestamp lands on the same day
            .json(&json!({"date": "2026-10-01T08:00:00Z", "records": [{"memberId": member.id, "status": "ABSENT"}]}))
            .await
            .json::<ApiResponse<Vec<AttendanceResponse>>>()
            .data
            .unwrap();
        assert_eq!(second[0].id, first[0].id);
        assert_eq!(second[0].status, AttendanceStatus::Absent);

        let history: ApiResponse<Vec<AttendanceResponse>> = app
            .get(&format!("/api/attendance/member/{}", member.id))
            .add_header(name.clone(), value.clone())
            .await
            .json();
        assert_eq!(history.count, Some(1));

        let sheet = app
            .get("/api/attendance/sheet?date=2026-10-01")
            .add_header(name.clone(), value.clone())
            .await
            .json::<ApiResponse<Vec<AttendanceSheetEntry>>>()
            .data
            .unwrap();
        assert_eq!(sheet.len(), 1);
        assert!(sheet[0].marked);
        assert_eq!(sheet[0].status, AttendanceStatus::Absent);

        let other_day = app
            .get("/api/attendance/sheet?date=2026-10-02")
            .add_header(name.clone(), value.clone())
            .await
            .json::<ApiResponse<Vec<AttendanceSheetEntry>>>()
            .data
            .unwrap();
        assert!(!other_day[0].marked);
        assert_eq!(other_day[0].status, AttendanceStatus::Present);

        let in_room: ApiResponse<Vec<AttendanceResponse>> = app
            .get(&format!("/api/attendance/room?roomId={}&date=2026-10-01", room.id))
            .add_header(name, value)
            .await
            .json();
        assert_eq!(in_room.count, Some(1));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_mark_bulk_rejects_bad_sheets(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let admin = create_test_admin(&pool).await;
        let (name, value) = auth_header(&admin);
        let member = create_test_member(&pool, "M1").await;

        app.post("/api/attendance/mark-bulk")
            .add_header(name.clone(), value.clone())
            .json(&json!({"date": "2026-10-01", "records": []}))
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        app.post("/api/attendance/mark-bulk")
            .add_header(name.clone(), value.clone())
            .json(&json!({"date": "2026-10-01", "records": [{"memberId": member.id}, {"memberId": member.id}]}))
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        app.post("/api/attendance/mark-bulk")
            .add_header(name, value)
            .json(&json!({"date": "2026-10-01", "records": [{"memberId": uuid::Uuid::new_v4()}]}))
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_delete_hides_mark(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let admin = create_test_admin(&pool).await;
        let (name, value) = auth_header(&admin);
        let member = create_test_member(&pool, "M1").await;

        let marks = app
            .post("/api/attendance/mark-bulk")
            .add_header(name.clone(), value.clone())
            .json(&json!({"date": "2026-10-03", "records": [{"memberId": member.id, "status": "LEAVE"}]}))
            .await
            .json::<ApiResponse<Vec<AttendanceResponse>>>()
            .data
            .unwrap();

        let url = format!("/api/attendance/{}", marks[0].id);
        app.delete(&url).add_header(name.clone(), value.clone()).await.assert_status_ok();
        app.delete(&url)
            .add_header(name.clone(), value.clone())
            .await
            .assert_status(StatusCode::NOT_FOUND);

        let history: ApiResponse<Vec<AttendanceResponse>> = app
            .get(&format!("/api/attendance/member/{}", member.id))
            .add_header(name, value)
            .await
            .json();
        assert_eq!(history.count, Some(0));
    }
}
