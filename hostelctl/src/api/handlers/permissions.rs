use crate::{
    AppState,
    api::JsonBody,
    api::models::{
        permissions::{ListPermissionsQuery, PermissionCreate, PermissionResponse, PermissionUpdate},
        response::{ApiResponse, MessageResponse},
    },
    auth::permissions::{RequiresPermission, require},
    db::handlers::{Permissions, Repository, permissions::PermissionFilter},
    db::models::permissions::{PermissionCreateDBRequest, PermissionUpdateDBRequest},
    errors::{Error, Result},
    types::{Lifecycle, PermissionId, PermissionKey},
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};

#[utoipa::path(
    post,
    path = "/permissions",
    request_body = PermissionCreate,
    tag = "permissions",
    summary = "Register permission",
    responses(
        (status = 201, description = "Permission created", body = ApiResponse<PermissionResponse>),
        (status = 400, description = "Missing fields, unknown key or duplicate"),
        (status = 403, description = "Missing PERMISSION_CREATE"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_permission(
    State(state): State<AppState>,
    _: RequiresPermission<require::PermissionCreate>,
    JsonBody(body): JsonBody<PermissionCreate>,
) -> Result<(StatusCode, Json<ApiResponse<PermissionResponse>>)> {
    let name = body.name.trim();
    let module = body.module.trim();
    let key = body.key.trim().to_uppercase();
    if name.is_empty() || module.is_empty() || key.is_empty() {
        return Err(Error::bad_request("Name, key and module are required"));
    }
    let key: PermissionKey = key.parse().map_err(Error::bad_request)?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let permission = Permissions::new(&mut conn)
        .create(&PermissionCreateDBRequest {
            name: name.to_string(),
            key,
            module: module.to_lowercase(),
            description: body.description,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(
            "Permission created successfully",
            PermissionResponse::from(permission),
        )),
    ))
}

#[utoipa::path(
    get,
    path = "/permissions",
    tag = "permissions",
    summary = "List permissions",
    params(ListPermissionsQuery),
    responses(
        (status = 200, description = "Permissions", body = ApiResponse<Vec<PermissionResponse>>),
        (status = 403, description = "Missing PERMISSION_VIEW"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_permissions(
    State(state): State<AppState>,
    Query(query): Query<ListPermissionsQuery>,
    _: RequiresPermission<require::PermissionView>,
) -> Result<Json<ApiResponse<Vec<PermissionResponse>>>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let permissions = Permissions::new(&mut conn)
        .list(&PermissionFilter {
            module: query.module,
            lifecycle: query.is_active.map(Lifecycle::from),
        })
        .await?;

    Ok(Json(ApiResponse::list(
        permissions.into_iter().map(PermissionResponse::from).collect(),
    )))
}

#[utoipa::path(
    get,
    path = "/permissions/{id}",
    tag = "permissions",
    summary = "Get permission",
    params(("id" = uuid::Uuid, Path, description = "Permission ID")),
    responses(
        (status = 200, description = "Permission", body = ApiResponse<PermissionResponse>),
        (status = 404, description = "Permission not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_permission(
    State(state): State<AppState>,
    Path(id): Path<PermissionId>,
    _: RequiresPermission<require::PermissionView>,
) -> Result<Json<ApiResponse<PermissionResponse>>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let permission = Permissions::new(&mut conn)
        .get_by_id(id)
        .await?
        .ok_or_else(|| Error::not_found("Permission", id))?;

    Ok(Json(ApiResponse::data(PermissionResponse::from(permission))))
}

#[utoipa::path(
    put,
    path = "/permissions/{id}",
    request_body = PermissionUpdate,
    tag = "permissions",
    summary = "Update permission",
    params(("id" = uuid::Uuid, Path, description = "Permission ID")),
    responses(
        (status = 200, description = "Updated permission", body = ApiResponse<PermissionResponse>),
        (status = 404, description = "Permission not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_permission(
    State(state): State<AppState>,
    Path(id): Path<PermissionId>,
    _: RequiresPermission<require::PermissionUpdate>,
    JsonBody(body): JsonBody<PermissionUpdate>,
) -> Result<Json<ApiResponse<PermissionResponse>>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let permission = Permissions::new(&mut conn)
        .update(
            id,
            &PermissionUpdateDBRequest {
                name: body.name.map(|n| n.trim().to_string()),
                module: body.module.map(|m| m.trim().to_lowercase()),
                description: body.description,
                lifecycle: None,
            },
        )
        .await?;

    Ok(Json(ApiResponse::with_message(
        "Permission updated successfully",
        PermissionResponse::from(permission),
    )))
}

#[utoipa::path(
    patch,
    path = "/permissions/{id}/status",
    tag = "permissions",
    summary = "Toggle permission active state",
    params(("id" = uuid::Uuid, Path, description = "Permission ID")),
    responses(
        (status = 200, description = "New state", body = ApiResponse<PermissionResponse>),
        (status = 404, description = "Permission not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn toggle_permission_status(
    State(state): State<AppState>,
    Path(id): Path<PermissionId>,
    _: RequiresPermission<require::PermissionUpdate>,
) -> Result<Json<ApiResponse<PermissionResponse>>> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Permissions::new(&mut tx);

    let current = repo.get_by_id(id).await?.ok_or_else(|| Error::not_found("Permission", id))?;
    let permission = repo
        .update(
            id,
            &PermissionUpdateDBRequest {
                lifecycle: Some(current.lifecycle.toggled()),
                ..Default::default()
            },
        )
        .await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    let message = if permission.lifecycle.is_active() {
        "Permission activated"
    } else {
        "Permission deactivated"
    };
    Ok(Json(ApiResponse::with_message(message, PermissionResponse::from(permission))))
}

#[utoipa::path(
    delete,
    path = "/permissions/{id}",
    tag = "permissions",
    summary = "Deactivate permission",
    params(("id" = uuid::Uuid, Path, description = "Permission ID")),
    responses(
        (status = 200, description = "Permission deactivated", body = MessageResponse),
        (status = 404, description = "Permission not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_permission(
    State(state): State<AppState>,
    Path(id): Path<PermissionId>,
    _: RequiresPermission<require::PermissionDelete>,
) -> Result<Json<MessageResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    if !Permissions::new(&mut conn).delete(id).await? {
        return Err(Error::not_found("Permission", id));
    }

    Ok(Json(MessageResponse::new("Permission deactivated successfully")))
}

#[cfg(test)]
mod tests {
    use crate::{
        api::models::{permissions::PermissionResponse, response::ApiResponse},
        test_utils::*,
        types::PermissionKey,
    };
    use axum::http::StatusCode;
    use serde_json::json;
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_unknown_key_rejected(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let admin = create_test_user(&pool, &[PermissionKey::PermissionCreate]).await;
        let (name, value) = auth_header(&admin);

        let response = app
            .post("/api/permissions")
            .add_header(name, value)
            .json(&json!({"name": "Launch Rockets", "key": "rocket_launch", "module": "rocket"}))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let body: serde_json::Value = response.json();
        assert_eq!(body["message"], "Unknown permission key: ROCKET_LAUNCH");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_duplicate_key_rejected(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        // Creating a user seeds every known key
        let admin = create_test_user(&pool, &[PermissionKey::PermissionCreate]).await;
        let (name, value) = auth_header(&admin);

        let response = app
            .post("/api/permissions")
            .add_header(name, value)
            .json(&json!({"name": "Another Room Create", "key": "room_create", "module": "room"}))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let body: serde_json::Value = response.json();
        assert_eq!(body["message"], "Permission with this name or key already exists");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_list_filter_and_toggle(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let admin = create_test_user(&pool, &[PermissionKey::PermissionView, PermissionKey::PermissionUpdate]).await;
        let (name, value) = auth_header(&admin);

        let response = app
            .get("/api/permissions?module=room")
            .add_header(name.clone(), value.clone())
            .await;
        response.assert_status_ok();
        let body: ApiResponse<Vec<PermissionResponse>> = response.json();
        assert_eq!(body.count, Some(4));
        let room_view = body
            .data
            .unwrap()
            .into_iter()
            .find(|p| p.key == PermissionKey::RoomView)
            .unwrap();
        assert!(room_view.is_active);

        let response = app
            .patch(&format!("/api/permissions/{}/status", room_view.id))
            .add_header(name.clone(), value.clone())
            .await;
        response.assert_status_ok();
        let body: ApiResponse<PermissionResponse> = response.json();
        assert!(!body.data.unwrap().is_active);

        let response = app
            .get("/api/permissions?module=room&isActive=false")
            .add_header(name, value)
            .await;
        let body: ApiResponse<Vec<PermissionResponse>> = response.json();
        assert_eq!(body.count, Some(1));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_deactivated_permission_is_not_granted(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let admin = create_test_user(&pool, &[PermissionKey::PermissionView, PermissionKey::PermissionDelete]).await;
        let clerk = create_test_user(&pool, &[PermissionKey::RoomView]).await;
        let (name, value) = auth_header(&admin);

        let response = app
            .get("/api/permissions?module=room")
            .add_header(name.clone(), value.clone())
            .await;
        let body: ApiResponse<Vec<PermissionResponse>> = response.json();
        let room_view = body
            .data
            .unwrap()
            .into_iter()
            .find(|p| p.key == PermissionKey::RoomView)
            .unwrap();

        let (clerk_name, clerk_value) = auth_header(&clerk);
        app.get("/api/rooms")
            .add_header(clerk_name.clone(), clerk_value.clone())
            .await
            .assert_status_ok();

        app.delete(&format!("/api/permissions/{}", room_view.id))
            .add_header(name, value)
            .await
            .assert_status_ok();

        app.get("/api/rooms")
            .add_header(clerk_name, clerk_value)
            .await
            .assert_status(StatusCode::FORBIDDEN);
    }
}
