use crate::{
    AppState,
    api::JsonBody,
    api::models::{
        auth::{LoginRequest, LoginResponse, LoginUser, SignupRequest},
        response::ApiResponse,
        users::UserResponse,
    },
    auth::{
        password::{self, Argon2Params},
        permissions::{RequiresPermission, require},
        session,
    },
    db::handlers::{Repository, Roles, Users},
    db::models::users::UserCreateDBRequest,
    errors::{Error, Result},
    types::Lifecycle,
};
use axum::{Json, extract::State, http::StatusCode};
use tracing::info;

fn invalid_credentials() -> Error {
    Error::Unauthenticated {
        message: Some("Invalid email or password".to_string()),
    }
}

/// Login with email and password
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    tag = "auth",
    summary = "Log in",
    responses(
        (status = 200, description = "Login successful", body = ApiResponse<LoginResponse>),
        (status = 401, description = "Invalid email or password"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<LoginRequest>,
) -> Result<Json<ApiResponse<LoginResponse>>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut users = Users::new(&mut conn);

    // Unknown, inactive and wrong-password logins are indistinguishable to the caller
    let user = users.get_by_email(&request.email).await?.ok_or_else(invalid_credentials)?;
    if !user.lifecycle.is_active() {
        return Err(invalid_credentials());
    }

    let is_valid = password::verify_password(request.password, user.password_hash.clone()).await?;
    if !is_valid {
        return Err(invalid_credentials());
    }

    users.touch_last_login(user.id).await?;
    let token = session::create_session_token(user.id, &user.role_code, &state.config)?;
    info!(user_id = %user.id, "user logged in");

    Ok(Json(ApiResponse::with_message(
        "Login successful",
        LoginResponse {
            token,
            user: LoginUser {
                id: user.id,
                full_name: user.full_name,
                email: user.email,
                role: user.role_code,
            },
        },
    )))
}

/// Create a staff account (administrators only)
#[utoipa::path(
    post,
    path = "/auth/signup",
    request_body = SignupRequest,
    tag = "auth",
    summary = "Create staff user",
    responses(
        (status = 201, description = "User created", body = ApiResponse<UserResponse>),
        (status = 400, description = "Missing fields, invalid role, weak password or duplicate email"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Missing USER_CREATE"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn signup(
    State(state): State<AppState>,
    current_user: RequiresPermission<require::UserCreate>,
    JsonBody(request): JsonBody<SignupRequest>,
) -> Result<(StatusCode, Json<ApiResponse<UserResponse>>)> {
    let full_name = request.full_name.trim();
    let email = request.email.trim();
    if full_name.is_empty() || email.is_empty() || request.password.is_empty() {
        return Err(Error::bad_request("fullName, email, password and roleId are required"));
    }
    password::validate_length(&request.password, &state.config.auth.password)?;

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

    let role = Roles::new(&mut tx).get_by_id(request.role_id).await?;
    if !role.is_some_and(|r| r.lifecycle.is_active()) {
        return Err(Error::bad_request("Invalid role"));
    }

    let password_hash = password::hash_password(request.password, Argon2Params::from(&state.config.auth.password)).await?;

    let user = Users::new(&mut tx)
        .create(&UserCreateDBRequest {
            full_name: full_name.to_string(),
            email: email.to_string(),
            password_hash,
            role_id: request.role_id,
            phone: request.phone,
            lifecycle: Lifecycle::from(request.is_active.unwrap_or(true)),
            created_by: Some(current_user.id),
        })
        .await?;

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;
    info!(user_id = %user.id, created_by = %current_user.id, "staff user created");

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message("User created successfully", UserResponse::from(user))),
    ))
}

#[cfg(test)]
mod tests {
    use crate::{
        api::models::{auth::LoginResponse, response::ApiResponse, users::UserResponse},
        test_utils::*,
        types::PermissionKey,
    };
    use axum::http::StatusCode;
    use serde_json::json;
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_login_returns_token_usable_on_profile(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let user = create_test_user(&pool, &[PermissionKey::RoomView]).await;

        let response = app
            .post("/api/auth/login")
            .json(&json!({"email": user.email, "password": TEST_PASSWORD}))
            .await;

        response.assert_status_ok();
        let body: ApiResponse<LoginResponse> = response.json();
        let login = body.data.unwrap();
        assert_eq!(login.user.id, user.id);
        assert_eq!(login.user.role, user.role_code);

        let (name, value) = bearer_header(&login.token);
        let profile = app.get("/api/users/profile").add_header(name, value).await;
        profile.assert_status_ok();
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_login_failures_are_uniform(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let user = create_test_user(&pool, &[]).await;

        for (email, password) in [
            (user.email.as_str(), "wrong-password"),
            ("nobody@example.com", TEST_PASSWORD),
        ] {
            let response = app
                .post("/api/auth/login")
                .json(&json!({"email": email, "password": password}))
                .await;
            response.assert_status(StatusCode::UNAUTHORIZED);
            let body: serde_json::Value = response.json();
            assert_eq!(body["success"], false);
            assert_eq!(body["message"], "Invalid email or password");
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_inactive_user_cannot_log_in(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let admin = create_test_user(&pool, &[PermissionKey::UserStatus]).await;
        let user = create_test_user(&pool, &[]).await;

        let (name, value) = auth_header(&admin);
        app.patch(&format!("/api/users/{}/status", user.id))
            .add_header(name, value)
            .await
            .assert_status_ok();

        let response = app
            .post("/api/auth/login")
            .json(&json!({"email": user.email, "password": TEST_PASSWORD}))
            .await;
        response.assert_status(StatusCode::UNAUTHORIZED);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_signup_requires_user_create(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let clerk = create_test_user(&pool, &[PermissionKey::UserView]).await;
        let role_id = create_test_role(&pool, &[]).await;

        let (name, value) = auth_header(&clerk);
        let response = app
            .post("/api/auth/signup")
            .add_header(name, value)
            .json(&json!({
                "fullName": "New Clerk",
                "email": "clerk@example.com",
                "password": "long-enough-password",
                "roleId": role_id,
            }))
            .await;
        response.assert_status(StatusCode::FORBIDDEN);

        let response = app
            .post("/api/auth/signup")
            .json(&json!({
                "fullName": "New Clerk",
                "email": "clerk@example.com",
                "password": "long-enough-password",
                "roleId": role_id,
            }))
            .await;
        response.assert_status(StatusCode::UNAUTHORIZED);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_signup_creates_user_without_hash(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let admin = create_test_user(&pool, &[PermissionKey::UserCreate]).await;
        let role_id = create_test_role(&pool, &[PermissionKey::RoomView]).await;

        let (name, value) = auth_header(&admin);
        let response = app
            .post("/api/auth/signup")
            .add_header(name, value)
            .json(&json!({
                "fullName": "Ayesha Khan",
                "email": "Ayesha@Example.com",
                "password": "long-enough-password",
                "roleId": role_id,
                "phone": "0300-1234567",
            }))
            .await;

        response.assert_status(StatusCode::CREATED);
        let raw: serde_json::Value = response.json();
        assert!(raw["data"].get("passwordHash").is_none());
        let body: ApiResponse<UserResponse> = response.json();
        let user = body.data.unwrap();
        assert_eq!(user.email, "ayesha@example.com");
        assert_eq!(user.role.id, role_id);
        assert!(user.is_active);
        assert_eq!(user.created_by, Some(admin.id));

        // The new account can log in straight away
        app.post("/api/auth/login")
            .json(&json!({"email": "ayesha@example.com", "password": "long-enough-password"}))
            .await
            .assert_status_ok();
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_signup_validation(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let admin = create_test_user(&pool, &[PermissionKey::UserCreate]).await;
        let role_id = create_test_role(&pool, &[]).await;
        let (name, value) = auth_header(&admin);

        // Missing roleId
        let response = app
            .post("/api/auth/signup")
            .add_header(name.clone(), value.clone())
            .json(&json!({"fullName": "X", "email": "x@example.com", "password": "long-enough-password"}))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);

        // Too short
        let response = app
            .post("/api/auth/signup")
            .add_header(name.clone(), value.clone())
            .json(&json!({"fullName": "X", "email": "x@example.com", "password": "short", "roleId": role_id}))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);

        // Unknown role
        let response = app
            .post("/api/auth/signup")
            .add_header(name.clone(), value.clone())
            .json(&json!({
                "fullName": "X",
                "email": "x@example.com",
                "password": "long-enough-password",
                "roleId": uuid::Uuid::new_v4(),
            }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);

        // Duplicate email
        let response = app
            .post("/api/auth/signup")
            .add_header(name, value)
            .json(&json!({
                "fullName": "X",
                "email": admin.email,
                "password": "long-enough-password",
                "roleId": role_id,
            }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let body: serde_json::Value = response.json();
        assert_eq!(body["message"], "An account with this email address already exists");
    }
}
