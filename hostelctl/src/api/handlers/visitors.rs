use crate::{
    AppState,
    api::JsonBody,
    api::models::{
        response::{ApiResponse, MessageResponse},
        visitors::{ListVisitorsQuery, VisitorCheckout, VisitorCreate, VisitorResponse},
    },
    auth::permissions::{RequiresPermission, require},
    db::handlers::{Members, Repository, Visitors, visitors::VisitorFilter},
    db::models::visitors::{VisitorCreateDBRequest, VisitorStatus, VisitorUpdateDBRequest},
    errors::{Error, Result},
    types::VisitorId,
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};

#[utoipa::path(
    post,
    path = "/visitors",
    request_body = VisitorCreate,
    tag = "visitors",
    summary = "Check visitor in",
    responses(
        (status = 201, description = "Visitor logged", body = ApiResponse<VisitorResponse>),
        (status = 400, description = "Missing fields"),
        (status = 404, description = "Member not found"),
        (status = 403, description = "Missing VISITOR_CREATE"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_visitor(
    State(state): State<AppState>,
    current_user: RequiresPermission<require::VisitorCreate>,
    JsonBody(body): JsonBody<VisitorCreate>,
) -> Result<(StatusCode, Json<ApiResponse<VisitorResponse>>)> {
    let visitor_name = body.visitor_name.trim();
    let purpose = body.purpose.trim();
    if visitor_name.is_empty() || purpose.is_empty() {
        return Err(Error::bad_request("Visitor name, purpose and member are required"));
    }

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    Members::new(&mut conn)
        .get_by_id(body.member_id)
        .await?
        .filter(|m| m.lifecycle.is_active())
        .ok_or_else(|| Error::not_found("Member", body.member_id))?;

    let visitor = Visitors::new(&mut conn)
        .create(&VisitorCreateDBRequest {
            visitor_name: visitor_name.to_string(),
            visitor_phone: body.visitor_phone,
            purpose: purpose.to_string(),
            member_id: body.member_id,
            remarks: body.remarks,
            logged_by: Some(current_user.id),
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(
            "Visitor checked in successfully",
            VisitorResponse::from(visitor),
        )),
    ))
}

#[utoipa::path(
    get,
    path = "/visitors",
    tag = "visitors",
    summary = "List visitors",
    params(ListVisitorsQuery),
    responses(
        (status = 200, description = "Visitors, latest check-in first", body = ApiResponse<Vec<VisitorResponse>>),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_visitors(
    State(state): State<AppState>,
    Query(query): Query<ListVisitorsQuery>,
    _: RequiresPermission<require::VisitorView>,
) -> Result<Json<ApiResponse<Vec<VisitorResponse>>>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let visitors = Visitors::new(&mut conn)
        .list(&VisitorFilter {
            member_id: query.member_id,
            status: query.status,
        })
        .await?;

    Ok(Json(ApiResponse::list(visitors.into_iter().map(VisitorResponse::from).collect())))
}

#[utoipa::path(
    get,
    path = "/visitors/{id}",
    tag = "visitors",
    summary = "Get visitor",
    params(("id" = uuid::Uuid, Path, description = "Visitor ID")),
    responses(
        (status = 200, description = "Visitor", body = ApiResponse<VisitorResponse>),
        (status = 404, description = "Visitor not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_visitor(
    State(state): State<AppState>,
    Path(id): Path<VisitorId>,
    _: RequiresPermission<require::VisitorView>,
) -> Result<Json<ApiResponse<VisitorResponse>>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let visitor = Visitors::new(&mut conn)
        .get_by_id(id)
        .await?
        .ok_or_else(|| Error::not_found("Visitor", id))?;

    Ok(Json(ApiResponse::data(VisitorResponse::from(visitor))))
}

#[utoipa::path(
    put,
    path = "/visitors/{id}/checkout",
    request_body = VisitorCheckout,
    tag = "visitors",
    summary = "Check visitor out",
    params(("id" = uuid::Uuid, Path, description = "Visitor ID")),
    responses(
        (status = 200, description = "Visitor checked out", body = ApiResponse<VisitorResponse>),
        (status = 400, description = "Visitor already checked out"),
        (status = 404, description = "Visitor not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn checkout_visitor(
    State(state): State<AppState>,
    Path(id): Path<VisitorId>,
    _: RequiresPermission<require::VisitorUpdate>,
    JsonBody(body): JsonBody<VisitorCheckout>,
) -> Result<Json<ApiResponse<VisitorResponse>>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut visitors = Visitors::new(&mut conn);

    let visitor = visitors.get_by_id(id).await?.ok_or_else(|| Error::not_found("Visitor", id))?;
    if visitor.status == VisitorStatus::Out {
        return Err(Error::conflict("Visitor already checked out"));
    }

    let visitor = visitors
        .update(
            id,
            &VisitorUpdateDBRequest {
                remarks: body.remarks,
                check_out: true,
            },
        )
        .await?;

    Ok(Json(ApiResponse::with_message(
        "Visitor checked out successfully",
        VisitorResponse::from(visitor),
    )))
}

#[utoipa::path(
    delete,
    path = "/visitors/{id}",
    tag = "visitors",
    summary = "Delete visitor record",
    params(("id" = uuid::Uuid, Path, description = "Visitor ID")),
    responses(
        (status = 200, description = "Visitor record deleted", body = MessageResponse),
        (status = 400, description = "Visitor still checked in"),
        (status = 404, description = "Visitor not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_visitor(
    State(state): State<AppState>,
    Path(id): Path<VisitorId>,
    _: RequiresPermission<require::VisitorDelete>,
) -> Result<Json<MessageResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut visitors = Visitors::new(&mut conn);

    let visitor = visitors.get_by_id(id).await?.ok_or_else(|| Error::not_found("Visitor", id))?;
    if visitor.status == VisitorStatus::In {
        return Err(Error::conflict("Check the visitor out before deleting the record"));
    }
    visitors.delete(id).await?;

    Ok(Json(MessageResponse::new("Visitor record deleted successfully")))
}

#[cfg(test)]
mod tests {
    use crate::{
        api::models::{response::ApiResponse, visitors::VisitorResponse},
        db::models::visitors::VisitorStatus,
        test_utils::*,
        types::PermissionKey,
    };
    use axum::http::StatusCode;
    use serde_json::json;
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_check_in_out_and_delete(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let admin = create_test_admin(&pool).await;
        let (name, value) = auth_header(&admin);
        let member = create_test_member(&pool, "M1").await;

        let response = app
            .post("/api/visitors")
            .add_header(name.clone(), value.clone())
            .json(&json!({"visitorName": "Tariq", "purpose": "Family visit", "memberId": member.id}))
            .await;
        response.assert_status(StatusCode::CREATED);
        let visitor = response.json::<ApiResponse<VisitorResponse>>().data.unwrap();
        assert_eq!(visitor.status, VisitorStatus::In);
        assert!(visitor.out_time.is_none());

        let url = format!("/api/visitors/{}", visitor.id);
        app.delete(&url)
            .add_header(name.clone(), value.clone())
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        let visitor = app
            .put(&format!("{url}/checkout"))
            .add_header(name.clone(), value.clone())
            .json(&json!({"remarks": "left at 6pm"}))
            .await
            .json::<ApiResponse<VisitorResponse>>()
            .data
            .unwrap();
        assert_eq!(visitor.status, VisitorStatus::Out);
        assert!(visitor.out_time.is_some());
        assert_eq!(visitor.remarks.as_deref(), Some("left at 6pm"));

        let response = app
            .put(&format!("{url}/checkout"))
            .add_header(name.clone(), value.clone())
            .json(&json!({}))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let body: serde_json::Value = response.json();
        assert_eq!(body["message"], "Visitor already checked out");

        app.delete(&url).add_header(name.clone(), value.clone()).await.assert_status_ok();
        app.get(&url)
            .add_header(name, value)
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_validation_and_filters(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let guard = create_test_user(&pool, &[PermissionKey::VisitorCreate, PermissionKey::VisitorView]).await;
        let (name, value) = auth_header(&guard);
        let member = create_test_member(&pool, "M1").await;

        app.post("/api/visitors")
            .add_header(name.clone(), value.clone())
            .json(&json!({"visitorName": "Tariq", "memberId": member.id}))
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        app.post("/api/visitors")
            .add_header(name.clone(), value.clone())
            .json(&json!({"visitorName": "Tariq", "purpose": "Visit", "memberId": uuid::Uuid::new_v4()}))
            .await
            .assert_status(StatusCode::NOT_FOUND);

        for visitor in ["Tariq", "Asma"] {
            app.post("/api/visitors")
                .add_header(name.clone(), value.clone())
                .json(&json!({"visitorName": visitor, "purpose": "Visit", "memberId": member.id}))
                .await
                .assert_status(StatusCode::CREATED);
        }

        let body: ApiResponse<Vec<VisitorResponse>> = app
            .get(&format!("/api/visitors?memberId={}&status=IN", member.id))
            .add_header(name.clone(), value.clone())
            .await
            .json();
        assert_eq!(body.count, Some(2));

        // No VISITOR_UPDATE on this role
        let id = body.data.unwrap()[0].id;
        app.put(&format!("/api/visitors/{id}/checkout"))
            .add_header(name, value)
            .json(&json!({}))
            .await
            .assert_status(StatusCode::FORBIDDEN);
    }
}
