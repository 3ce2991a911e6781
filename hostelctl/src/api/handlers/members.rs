use crate::{
    AppState,
    api::JsonBody,
    api::models::{
        members::{ListMembersQuery, MemberCreate, MemberResponse, MemberStatusUpdate, MemberUpdate},
        response::{ApiResponse, MessageResponse},
    },
    auth::permissions::{RequiresPermission, require},
    db::handlers::{
        BedAssignments, Members, Repository,
        bed_assignments::release_placement,
        members::MemberFilter,
    },
    db::models::members::{MemberCreateDBRequest, MemberDBResponse, MemberStatus, MemberUpdateDBRequest},
    errors::{Error, Result},
    types::{Lifecycle, MemberId},
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use sqlx::PgConnection;
use tracing::info;

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

async fn lock_active_member(conn: &mut PgConnection, id: MemberId) -> Result<MemberDBResponse> {
    Members::new(conn)
        .lock(id)
        .await?
        .filter(|m| m.lifecycle.is_active())
        .ok_or_else(|| Error::not_found("Member", id))
}

#[utoipa::path(
    post,
    path = "/members",
    request_body = MemberCreate,
    tag = "members",
    summary = "Register member",
    responses(
        (status = 201, description = "Member created", body = ApiResponse<MemberResponse>),
        (status = 400, description = "Missing fields or duplicate code/CNIC"),
        (status = 403, description = "Missing MEMBER_CREATE"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_member(
    State(state): State<AppState>,
    current_user: RequiresPermission<require::MemberCreate>,
    JsonBody(body): JsonBody<MemberCreate>,
) -> Result<(StatusCode, Json<ApiResponse<MemberResponse>>)> {
    let required = [&body.member_code, &body.full_name, &body.cnic, &body.phone, &body.guardian_name];
    if required.iter().any(|field| field.trim().is_empty()) {
        return Err(Error::bad_request(
            "memberCode, fullName, cnic, phone and guardianName are required",
        ));
    }

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let member = Members::new(&mut conn)
        .create(&MemberCreateDBRequest {
            member_code: body.member_code.trim().to_string(),
            full_name: body.full_name.trim().to_string(),
            cnic: body.cnic.trim().to_string(),
            phone: body.phone.trim().to_string(),
            guardian_name: body.guardian_name.trim().to_string(),
            guardian_phone: non_empty(body.guardian_phone),
            institute_name: non_empty(body.institute_name),
            address: non_empty(body.address),
            join_date: body.join_date,
            created_by: Some(current_user.id),
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message("Member created successfully", MemberResponse::from(member))),
    ))
}

#[utoipa::path(
    get,
    path = "/members",
    tag = "members",
    summary = "List members",
    params(ListMembersQuery),
    responses(
        (status = 200, description = "Members, newest first", body = ApiResponse<Vec<MemberResponse>>),
        (status = 403, description = "Missing MEMBER_VIEW"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_members(
    State(state): State<AppState>,
    Query(query): Query<ListMembersQuery>,
    _: RequiresPermission<require::MemberView>,
) -> Result<Json<ApiResponse<Vec<MemberResponse>>>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let members = Members::new(&mut conn)
        .list(&MemberFilter {
            status: query.status,
            lifecycle: Some(Lifecycle::Active),
        })
        .await?;

    Ok(Json(ApiResponse::list(members.into_iter().map(MemberResponse::from).collect())))
}

#[utoipa::path(
    get,
    path = "/members/{id}",
    tag = "members",
    summary = "Get member",
    params(("id" = uuid::Uuid, Path, description = "Member ID")),
    responses(
        (status = 200, description = "Member", body = ApiResponse<MemberResponse>),
        (status = 404, description = "Member not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_member(
    State(state): State<AppState>,
    Path(id): Path<MemberId>,
    _: RequiresPermission<require::MemberView>,
) -> Result<Json<ApiResponse<MemberResponse>>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let member = Members::new(&mut conn)
        .get_by_id(id)
        .await?
        .filter(|m| m.lifecycle.is_active())
        .ok_or_else(|| Error::not_found("Member", id))?;

    Ok(Json(ApiResponse::data(MemberResponse::from(member))))
}

#[utoipa::path(
    put,
    path = "/members/{id}",
    request_body = MemberUpdate,
    tag = "members",
    summary = "Update member profile",
    params(("id" = uuid::Uuid, Path, description = "Member ID")),
    responses(
        (status = 200, description = "Updated member", body = ApiResponse<MemberResponse>),
        (status = 404, description = "Member not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_member(
    State(state): State<AppState>,
    Path(id): Path<MemberId>,
    _: RequiresPermission<require::MemberUpdate>,
    JsonBody(body): JsonBody<MemberUpdate>,
) -> Result<Json<ApiResponse<MemberResponse>>> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    lock_active_member(&mut tx, id).await?;

    let member = Members::new(&mut tx)
        .update(
            id,
            &MemberUpdateDBRequest {
                full_name: non_empty(body.full_name),
                phone: non_empty(body.phone),
                guardian_name: non_empty(body.guardian_name),
                guardian_phone: body.guardian_phone,
                institute_name: body.institute_name,
                address: body.address,
                join_date: body.join_date,
                lifecycle: None,
            },
        )
        .await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(ApiResponse::with_message("Member updated successfully", MemberResponse::from(member))))
}

#[utoipa::path(
    patch,
    path = "/members/{id}/status",
    request_body = MemberStatusUpdate,
    tag = "members",
    summary = "Change residency status",
    description = "Moving a member to LEFT closes their active bed assignment and frees the bed.",
    params(("id" = uuid::Uuid, Path, description = "Member ID")),
    responses(
        (status = 200, description = "Updated member", body = ApiResponse<MemberResponse>),
        (status = 404, description = "Member not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_member_status(
    State(state): State<AppState>,
    Path(id): Path<MemberId>,
    _: RequiresPermission<require::MemberUpdate>,
    JsonBody(body): JsonBody<MemberStatusUpdate>,
) -> Result<Json<ApiResponse<MemberResponse>>> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    lock_active_member(&mut tx, id).await?;

    if body.status == MemberStatus::Left {
        let active = BedAssignments::new(&mut tx).lock_active_for_member(id).await?;
        if let Some(assignment) = active {
            let closed = BedAssignments::new(&mut tx).close(assignment.id).await?;
            release_placement(&mut tx, &closed, MemberStatus::Left).await?;
            info!(member_id = %id, assignment_id = %closed.id, "assignment closed on leave");
        }
    }

    let member = Members::new(&mut tx).set_status(id, body.status).await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(ApiResponse::with_message("Member status updated", MemberResponse::from(member))))
}

#[utoipa::path(
    delete,
    path = "/members/{id}",
    tag = "members",
    summary = "Deactivate member",
    params(("id" = uuid::Uuid, Path, description = "Member ID")),
    responses(
        (status = 200, description = "Member deactivated", body = MessageResponse),
        (status = 400, description = "Member still holds a bed"),
        (status = 404, description = "Member not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_member(
    State(state): State<AppState>,
    Path(id): Path<MemberId>,
    _: RequiresPermission<require::MemberDelete>,
) -> Result<Json<MessageResponse>> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    lock_active_member(&mut tx, id).await?;

    if BedAssignments::new(&mut tx).lock_active_for_member(id).await?.is_some() {
        return Err(Error::bad_request("Cannot delete a member with an active bed assignment"));
    }

    Members::new(&mut tx).delete(id).await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(MessageResponse::new("Member deleted successfully")))
}

#[cfg(test)]
mod tests {
    use crate::{
        api::models::{
            bed_assignments::BedAssignmentResponse, beds::BedResponse, members::MemberResponse, response::ApiResponse,
        },
        db::models::{bed_assignments::AssignmentStatus, beds::BedStatus, members::MemberStatus},
        test_utils::*,
        types::PermissionKey,
    };
    use axum::http::StatusCode;
    use serde_json::json;
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_member_and_duplicates(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let admin = create_test_user(&pool, &[PermissionKey::MemberCreate]).await;
        let (name, value) = auth_header(&admin);
        let payload = json!({
            "memberCode": "M-001",
            "fullName": "Bilal Ahmed",
            "cnic": "35202-1111111-1",
            "phone": "0300-1111111",
            "guardianName": "Ahmed Ali",
            "instituteName": "UET",
        });

        let response = app
            .post("/api/members")
            .add_header(name.clone(), value.clone())
            .json(&payload)
            .await;
        response.assert_status(StatusCode::CREATED);
        let member = response.json::<ApiResponse<MemberResponse>>().data.unwrap();
        assert_eq!(member.status, MemberStatus::Active);
        assert!(member.current_bed_id.is_none());

        let response = app.post("/api/members").add_header(name.clone(), value.clone()).json(&payload).await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let body: serde_json::Value = response.json();
        assert_eq!(body["message"], "Member with same code or CNIC already exists");

        let response = app
            .post("/api/members")
            .add_header(name, value)
            .json(&json!({
                "memberCode": "M-002",
                "fullName": "",
                "cnic": "35202-2222222-2",
                "phone": "0300",
                "guardianName": "X",
            }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_member_left_releases_bed(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let admin = create_test_admin(&pool).await;
        let room = create_test_room(&pool, "A-1", 1, 7000).await;
        let bed = create_test_bed(&pool, room.id, "1").await;
        let member = create_test_member(&pool, "M-010").await;
        let (name, value) = auth_header(&admin);

        let assignment = app
            .post("/api/bed-assignments")
            .add_header(name.clone(), value.clone())
            .json(&json!({"memberId": member.id, "bedId": bed.id}))
            .await
            .json::<ApiResponse<BedAssignmentResponse>>()
            .data
            .unwrap();

        let response = app
            .patch(&format!("/api/members/{}/status", member.id))
            .add_header(name.clone(), value.clone())
            .json(&json!({"status": "LEFT"}))
            .await;
        response.assert_status_ok();
        let member = response.json::<ApiResponse<MemberResponse>>().data.unwrap();
        assert_eq!(member.status, MemberStatus::Left);
        assert!(member.leave_date.is_some());
        assert!(member.current_bed_id.is_none());
        assert!(member.current_room_id.is_none());

        let closed = app
            .get(&format!("/api/bed-assignments/{}", assignment.id))
            .add_header(name.clone(), value.clone())
            .await
            .json::<ApiResponse<BedAssignmentResponse>>()
            .data
            .unwrap();
        assert_eq!(closed.status, AssignmentStatus::Closed);
        assert!(closed.end_date.is_some());

        let bed = app
            .get(&format!("/api/beds/{}", bed.id))
            .add_header(name, value)
            .await
            .json::<ApiResponse<BedResponse>>()
            .data
            .unwrap();
        assert_eq!(bed.status, BedStatus::Available);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_cannot_delete_member_with_bed(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let admin = create_test_admin(&pool).await;
        let room = create_test_room(&pool, "A-1", 1, 7000).await;
        let bed = create_test_bed(&pool, room.id, "1").await;
        let member = create_test_member(&pool, "M-011").await;
        let (name, value) = auth_header(&admin);

        app.post("/api/bed-assignments")
            .add_header(name.clone(), value.clone())
            .json(&json!({"memberId": member.id, "bedId": bed.id}))
            .await
            .assert_status(StatusCode::CREATED);

        let response = app
            .delete(&format!("/api/members/{}", member.id))
            .add_header(name.clone(), value.clone())
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);

        let other = create_test_member(&pool, "M-012").await;
        app.delete(&format!("/api/members/{}", other.id))
            .add_header(name.clone(), value.clone())
            .await
            .assert_status_ok();

        let body: ApiResponse<Vec<MemberResponse>> = app.get("/api/members").add_header(name.clone(), value.clone()).await.json();
        assert_eq!(body.count, Some(1));

        app.get(&format!("/api/members/{}", other.id))
            .add_header(name, value)
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_update_profile_and_filter_by_status(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let admin = create_test_user(&pool, &[PermissionKey::MemberUpdate, PermissionKey::MemberView]).await;
        let member = create_test_member(&pool, "M-020").await;
        create_test_member(&pool, "M-021").await;
        let (name, value) = auth_header(&admin);

        let response = app
            .put(&format!("/api/members/{}", member.id))
            .add_header(name.clone(), value.clone())
            .json(&json!({"instituteName": "FAST", "phone": "0311-5555555"}))
            .await;
        response.assert_status_ok();
        let updated = response.json::<ApiResponse<MemberResponse>>().data.unwrap();
        assert_eq!(updated.institute_name.as_deref(), Some("FAST"));
        assert_eq!(updated.phone, "0311-5555555");

        app.patch(&format!("/api/members/{}/status", member.id))
            .add_header(name.clone(), value.clone())
            .json(&json!({"status": "ON_LEAVE"}))
            .await
            .assert_status_ok();

        let body: ApiResponse<Vec<MemberResponse>> = app
            .get("/api/members?status=ON_LEAVE")
            .add_header(name, value)
            .await
            .json();
        assert_eq!(body.count, Some(1));
        assert_eq!(body.data.unwrap()[0].id, member.id);
    }
}
