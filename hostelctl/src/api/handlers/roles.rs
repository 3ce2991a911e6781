use crate::{
    AppState,
    api::JsonBody,
    api::models::{
        response::ApiResponse,
        roles::{ListRolesQuery, RoleCreate, RoleResponse, RoleUpdate},
    },
    auth::permissions::{RequiresPermission, require},
    db::handlers::{Permissions, Repository, Roles, roles::RoleFilter},
    db::models::roles::{RoleCreateDBRequest, RoleUpdateDBRequest},
    errors::{Error, Result},
    types::{Lifecycle, PermissionId, RoleId},
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use sqlx::PgConnection;

/// Check that every id names an existing, active permission. Duplicates are dropped, order kept.
pub(crate) async fn validate_permission_ids(conn: &mut PgConnection, ids: &[PermissionId]) -> Result<Vec<PermissionId>> {
    let mut unique = Vec::with_capacity(ids.len());
    for id in ids {
        if !unique.contains(id) {
            unique.push(*id);
        }
    }

    let found = Permissions::new(conn).get_bulk(unique.clone()).await?;
    for id in &unique {
        match found.get(id) {
            Some(permission) if permission.lifecycle.is_active() => {}
            Some(_) => return Err(Error::bad_request(format!("Permission {id} is inactive"))),
            None => return Err(Error::bad_request(format!("Permission {id} does not exist"))),
        }
    }

    Ok(unique)
}

#[utoipa::path(
    post,
    path = "/roles",
    request_body = RoleCreate,
    tag = "roles",
    summary = "Create role",
    responses(
        (status = 201, description = "Role created", body = ApiResponse<RoleResponse>),
        (status = 400, description = "Missing fields, invalid permissions or duplicate"),
        (status = 403, description = "Missing ROLE_CREATE"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_role(
    State(state): State<AppState>,
    _: RequiresPermission<require::RoleCreate>,
    JsonBody(body): JsonBody<RoleCreate>,
) -> Result<(StatusCode, Json<ApiResponse<RoleResponse>>)> {
    let name = body.name.trim();
    let code = body.code.trim().to_uppercase();
    if name.is_empty() || code.is_empty() {
        return Err(Error::bad_request("Name and code are required"));
    }

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let permission_ids = validate_permission_ids(&mut tx, &body.permissions).await?;
    let role = Roles::new(&mut tx)
        .create(&RoleCreateDBRequest {
            name: name.to_string(),
            code,
            description: body.description,
            permission_ids,
            is_system_role: false,
        })
        .await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message("Role created successfully", RoleResponse::from(role))),
    ))
}

#[utoipa::path(
    get,
    path = "/roles",
    tag = "roles",
    summary = "List roles",
    params(ListRolesQuery),
    responses(
        (status = 200, description = "Roles with their permissions", body = ApiResponse<Vec<RoleResponse>>),
        (status = 403, description = "Missing ROLE_VIEW"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_roles(
    State(state): State<AppState>,
    Query(query): Query<ListRolesQuery>,
    _: RequiresPermission<require::RoleView>,
) -> Result<Json<ApiResponse<Vec<RoleResponse>>>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let roles = Roles::new(&mut conn)
        .list(&RoleFilter {
            lifecycle: query.is_active.map(Lifecycle::from),
        })
        .await?;

    Ok(Json(ApiResponse::list(roles.into_iter().map(RoleResponse::from).collect())))
}

#[utoipa::path(
    get,
    path = "/roles/{id}",
    tag = "roles",
    summary = "Get role",
    params(("id" = uuid::Uuid, Path, description = "Role ID")),
    responses(
        (status = 200, description = "Role", body = ApiResponse<RoleResponse>),
        (status = 404, description = "Role not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_role(
    State(state): State<AppState>,
    Path(id): Path<RoleId>,
    _: RequiresPermission<require::RoleView>,
) -> Result<Json<ApiResponse<RoleResponse>>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let role = Roles::new(&mut conn)
        .get_by_id(id)
        .await?
        .ok_or_else(|| Error::not_found("Role", id))?;

    Ok(Json(ApiResponse::data(RoleResponse::from(role))))
}

#[utoipa::path(
    put,
    path = "/roles/{id}",
    request_body = RoleUpdate,
    tag = "roles",
    summary = "Update role",
    params(("id" = uuid::Uuid, Path, description = "Role ID")),
    responses(
        (status = 200, description = "Updated role", body = ApiResponse<RoleResponse>),
        (status = 400, description = "Invalid permissions"),
        (status = 404, description = "Role not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_role(
    State(state): State<AppState>,
    Path(id): Path<RoleId>,
    _: RequiresPermission<require::RoleUpdate>,
    JsonBody(body): JsonBody<RoleUpdate>,
) -> Result<Json<ApiResponse<RoleResponse>>> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

    if Roles::new(&mut tx).get_by_id(id).await?.is_none() {
        return Err(Error::not_found("Role", id));
    }

    let permission_ids = match &body.permissions {
        Some(ids) => Some(validate_permission_ids(&mut tx, ids).await?),
        None => None,
    };

    let role = Roles::new(&mut tx)
        .update(
            id,
            &RoleUpdateDBRequest {
                name: body.name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
                description: body.description,
                permission_ids,
                lifecycle: None,
            },
        )
        .await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(ApiResponse::with_message("Role updated successfully", RoleResponse::from(role))))
}

#[utoipa::path(
    patch,
    path = "/roles/{id}/status",
    tag = "roles",
    summary = "Toggle role active state",
    params(("id" = uuid::Uuid, Path, description = "Role ID")),
    responses(
        (status = 200, description = "New state", body = ApiResponse<RoleResponse>),
        (status = 400, description = "System roles cannot be deactivated"),
        (status = 404, description = "Role not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn toggle_role_status(
    State(state): State<AppState>,
    Path(id): Path<RoleId>,
    _: RequiresPermission<require::RoleUpdate>,
) -> Result<Json<ApiResponse<RoleResponse>>> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Roles::new(&mut tx);

    let current = repo.get_by_id(id).await?.ok_or_else(|| Error::not_found("Role", id))?;
    if current.is_system_role {
        return Err(Error::bad_request("System roles cannot be deactivated"));
    }

    let role = repo
        .update(
            id,
            &RoleUpdateDBRequest {
                lifecycle: Some(current.lifecycle.toggled()),
                ..Default::default()
            },
        )
        .await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    let message = if role.lifecycle.is_active() {
        "Role activated"
    } else {
        "Role deactivated"
    };
    Ok(Json(ApiResponse::with_message(message, RoleResponse::from(role))))
}
