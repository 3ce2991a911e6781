use crate::{
    AppState,
    api::JsonBody,
    api::models::{
        response::ApiResponse,
        users::{CurrentUser, ListUsersQuery, ProfileResponse, UserResponse, UserUpdate},
    },
    auth::permissions::{RequiresPermission, require},
    db::handlers::{Repository, Roles, Users, users::UserFilter},
    db::models::users::UserUpdateDBRequest,
    errors::{Error, Result},
    types::{Lifecycle, PermissionKey, UserId},
};
use axum::{
    Json,
    extract::{Path, Query, State},
};
use tracing::info;

/// The caller's own account and granted keys
#[utoipa::path(
    get,
    path = "/users/profile",
    tag = "users",
    summary = "Current user profile",
    responses(
        (status = 200, description = "Profile", body = ApiResponse<ProfileResponse>),
        (status = 401, description = "Unauthorized"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_profile(State(state): State<AppState>, current_user: CurrentUser) -> Result<Json<ApiResponse<ProfileResponse>>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let user = Users::new(&mut conn)
        .get_by_id(current_user.id)
        .await?
        .ok_or_else(|| Error::not_found("User", current_user.id))?;

    let permissions = PermissionKey::ALL
        .iter()
        .copied()
        .filter(|key| current_user.permissions.contains(key))
        .collect();

    Ok(Json(ApiResponse::data(ProfileResponse {
        user: UserResponse::from(user),
        permissions,
    })))
}

#[utoipa::path(
    get,
    path = "/users",
    tag = "users",
    summary = "List users",
    params(ListUsersQuery),
    responses(
        (status = 200, description = "Users", body = ApiResponse<Vec<UserResponse>>),
        (status = 403, description = "Missing USER_VIEW"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<ListUsersQuery>,
    _: RequiresPermission<require::UserView>,
) -> Result<Json<ApiResponse<Vec<UserResponse>>>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let users = Users::new(&mut conn)
        .list(&UserFilter {
            lifecycle: query.is_active.map(Lifecycle::from),
            role_id: query.role_id,
        })
        .await?;

    Ok(Json(ApiResponse::list(users.into_iter().map(UserResponse::from).collect())))
}

#[utoipa::path(
    get,
    path = "/users/{id}",
    tag = "users",
    summary = "Get user",
    params(("id" = uuid::Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "User", body = ApiResponse<UserResponse>),
        (status = 404, description = "User not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<UserId>,
    _: RequiresPermission<require::UserView>,
) -> Result<Json<ApiResponse<UserResponse>>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let user = Users::new(&mut conn)
        .get_by_id(id)
        .await?
        .ok_or_else(|| Error::not_found("User", id))?;

    Ok(Json(ApiResponse::data(UserResponse::from(user))))
}

#[utoipa::path(
    put,
    path = "/users/{id}",
    request_body = UserUpdate,
    tag = "users",
    summary = "Update user",
    params(("id" = uuid::Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "Updated user", body = ApiResponse<UserResponse>),
        (status = 400, description = "Invalid role"),
        (status = 404, description = "User not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<UserId>,
    _: RequiresPermission<require::UserUpdate>,
    JsonBody(body): JsonBody<UserUpdate>,
) -> Result<Json<ApiResponse<UserResponse>>> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

    if Users::new(&mut tx).get_by_id(id).await?.is_none() {
        return Err(Error::not_found("User", id));
    }

    if let Some(role_id) = body.role_id {
        let role = Roles::new(&mut tx).get_by_id(role_id).await?;
        if !role.is_some_and(|r| r.lifecycle.is_active()) {
            return Err(Error::bad_request("Invalid role"));
        }
    }

    let user = Users::new(&mut tx)
        .update(
            id,
            &UserUpdateDBRequest {
                full_name: body.full_name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
                phone: body.phone,
                role_id: body.role_id,
                ..Default::default()
            },
        )
        .await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(ApiResponse::with_message("User updated successfully", UserResponse::from(user))))
}

#[utoipa::path(
    patch,
    path = "/users/{id}/status",
    tag = "users",
    summary = "Toggle user active state",
    params(("id" = uuid::Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "New state", body = ApiResponse<UserResponse>),
        (status = 400, description = "Cannot deactivate your own account"),
        (status = 404, description = "User not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn toggle_user_status(
    State(state): State<AppState>,
    Path(id): Path<UserId>,
    current_user: RequiresPermission<require::UserStatus>,
) -> Result<Json<ApiResponse<UserResponse>>> {
    if id == current_user.id {
        return Err(Error::bad_request("You cannot change the status of your own account"));
    }

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Users::new(&mut tx);

    let current = repo.get_by_id(id).await?.ok_or_else(|| Error::not_found("User", id))?;
    let user = repo
        .update(
            id,
            &UserUpdateDBRequest {
                lifecycle: Some(current.lifecycle.toggled()),
                ..Default::default()
            },
        )
        .await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;
    info!(user_id = %id, active = user.lifecycle.is_active(), changed_by = %current_user.id, "user status changed");

    let message = if user.lifecycle.is_active() {
        "User activated"
    } else {
        "User deactivated"
    };
    Ok(Json(ApiResponse::with_message(message, UserResponse::from(user))))
}

#[cfg(test)]
mod tests {
    use crate::{
        api::models::{
            response::ApiResponse,
            users::{ProfileResponse, UserResponse},
        },
        test_utils::*,
        types::PermissionKey,
    };
    use axum::http::StatusCode;
    use serde_json::json;
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_profile_lists_granted_keys(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let user = create_test_user(&pool, &[PermissionKey::BedView, PermissionKey::RoomView]).await;
        let (name, value) = auth_header(&user);

        let response = app.get("/api/users/profile").add_header(name, value).await;
        response.assert_status_ok();
        let profile = response.json::<ApiResponse<ProfileResponse>>().data.unwrap();
        assert_eq!(profile.user.id, user.id);
        assert_eq!(profile.permissions, vec![PermissionKey::RoomView, PermissionKey::BedView]);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_profile_requires_token(pool: PgPool) {
        let app = create_test_app(pool).await;
        app.get("/api/users/profile").await.assert_status(StatusCode::UNAUTHORIZED);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_list_filters_by_role(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let admin = create_test_user(&pool, &[PermissionKey::UserView]).await;
        let other = create_test_user(&pool, &[]).await;
        let (name, value) = auth_header(&admin);

        let response = app
            .get(&format!("/api/users?roleId={}", other.role_id))
            .add_header(name, value)
            .await;
        response.assert_status_ok();
        let body: ApiResponse<Vec<UserResponse>> = response.json();
        assert_eq!(body.count, Some(1));
        assert_eq!(body.data.unwrap()[0].id, other.id);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_update_rejects_unknown_role(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let admin = create_test_user(&pool, &[PermissionKey::UserUpdate]).await;
        let user = create_test_user(&pool, &[]).await;
        let new_role = create_test_role(&pool, &[PermissionKey::MemberView]).await;
        let (name, value) = auth_header(&admin);

        let response = app
            .put(&format!("/api/users/{}", user.id))
            .add_header(name.clone(), value.clone())
            .json(&json!({"roleId": uuid::Uuid::new_v4()}))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);

        let response = app
            .put(&format!("/api/users/{}", user.id))
            .add_header(name, value)
            .json(&json!({"fullName": "Renamed", "roleId": new_role}))
            .await;
        response.assert_status_ok();
        let updated = response.json::<ApiResponse<UserResponse>>().data.unwrap();
        assert_eq!(updated.full_name, "Renamed");
        assert_eq!(updated.role.id, new_role);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_cannot_deactivate_self(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let admin = create_test_user(&pool, &[PermissionKey::UserStatus]).await;
        let (name, value) = auth_header(&admin);

        let response = app
            .patch(&format!("/api/users/{}/status", admin.id))
            .add_header(name, value)
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_status_toggles_back_and_forth(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let admin = create_test_user(&pool, &[PermissionKey::UserStatus]).await;
        let user = create_test_user(&pool, &[]).await;
        let (name, value) = auth_header(&admin);

        for expected in [false, true] {
            let response = app
                .patch(&format!("/api/users/{}/status", user.id))
                .add_header(name.clone(), value.clone())
                .await;
            response.assert_status_ok();
            assert_eq!(response.json::<ApiResponse<UserResponse>>().data.unwrap().is_active, expected);
        }
    }
}
