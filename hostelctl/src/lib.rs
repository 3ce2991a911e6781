//! # hostelctl: hostel management backend
//!
//! `hostelctl` is the back office of a student hostel. It keeps track of rooms and the beds in
//! them, the residents ("members") who occupy those beds, what they order from the mess, the
//! monthly bills built from rent and mess charges, daily attendance and the visitor log. Staff
//! reach all of it through a JSON API guarded by role-based access control.
//!
//! ## Architecture
//!
//! The application is built on [Axum](https://github.com/tokio-rs/axum) for the HTTP layer and
//! uses PostgreSQL (through `sqlx`) for all persistence.
//!
//! ### Request Flow
//!
//! Every request passes the per-client rate limiter, then reaches its handler. Handlers declare
//! the permission they need as an extractor ([`auth::permissions::RequiresPermission`]), which
//! verifies the bearer session token and re-loads the caller's role and permissions from the
//! database. The handler validates its input and talks to the database through repositories in
//! [`db::handlers`]. Workflows that move several rows at once (assigning a bed, closing an
//! assignment, a member leaving, generating a bill) run inside a single transaction and lock the
//! rows they change.
//!
//! ### Core Components
//!
//! - **API layer** ([`api`]): handlers and request/response models, all under `/api`
//! - **Authentication** ([`auth`]): session tokens, password hashing, permission extractors
//! - **Database layer** ([`db`]): one repository per table plus the storage error type
//! - **Rate limiting** ([`rate_limit`]): sliding window per client address
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use hostelctl::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = hostelctl::config::Args::parse();
//!     let config = Config::load(&args)?;
//!     hostelctl::telemetry::init_telemetry()?;
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     })
//!     .await
//! }
//! ```
//!
//! ## Database Setup
//!
//! Migrations run automatically on startup. They are also exposed for tooling:
//!
//! ```no_run
//! # use sqlx::PgPool;
//! # async fn example(pool: PgPool) -> Result<(), sqlx::migrate::MigrateError> {
//! hostelctl::migrator().run(&pool).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Configuration
//!
//! See the [`config`] module for configuration options.
pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
mod openapi;
pub mod rate_limit;
pub mod telemetry;
pub mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

use crate::{
    api::{handlers, models::response::MessageResponse},
    auth::password::{Argon2Params, hash_password},
    config::CorsOrigin,
    db::{
        handlers::{Permissions, Repository, Roles, Users},
        models::users::{UserCreateDBRequest, UserUpdateDBRequest},
    },
    openapi::ApiDoc,
    rate_limit::{RateLimiter, rate_limit_middleware},
    types::{Lifecycle, RoleId},
};
use axum::{
    Json, Router,
    http::{self, HeaderValue},
    middleware::from_fn_with_state,
    routing::{delete, get, patch, post, put},
};
use bon::Builder;
pub use config::Config;
use sqlx::{PgConnection, PgPool, postgres::PgPoolOptions};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, debug, info, instrument, warn};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

pub use types::{MemberId, RoomId, UserId};

/// Code of the built-in role that holds every permission
pub const SUPER_ADMIN_ROLE: &str = "SUPER_ADMIN";

/// Application state shared across all request handlers.
///
/// # Example
///
/// ```ignore
/// let state = AppState::builder()
///     .db(pool)
///     .config(config)
///     .rate_limiter(Arc::new(RateLimiter::new(&config.rate_limit)))
///     .build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState {
    pub db: PgPool,
    pub config: Config,
    pub rate_limiter: Arc<RateLimiter>,
}

/// Get the hostelctl database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Create the initial admin user, or reset its password and role if it already exists.
///
/// Without a configured password nothing is created; an existing account is left untouched.
#[instrument(skip_all)]
pub async fn create_initial_admin_user(
    conn: &mut PgConnection,
    email: &str,
    password: Option<&str>,
    role_id: RoleId,
    params: Argon2Params,
) -> anyhow::Result<Option<UserId>> {
    let email = email.trim().to_lowercase();
    let existing = Users::new(&mut *conn).get_by_email(&email).await?;

    let Some(password) = password else {
        if existing.is_none() {
            warn!(email = %email, "admin_password is not set; initial admin user was not created");
        }
        return Ok(existing.map(|user| user.id));
    };

    let password_hash = hash_password(password.to_string(), params).await?;

    let user_id = match existing {
        Some(user) => {
            Users::new(&mut *conn)
                .update(
                    user.id,
                    &UserUpdateDBRequest {
                        role_id: Some(role_id),
                        lifecycle: Some(Lifecycle::Active),
                        password_hash: Some(password_hash),
                        ..Default::default()
                    },
                )
                .await?;
            debug!(user_id = %user.id, "initial admin user already exists, password reset");
            user.id
        }
        None => {
            let user = Users::new(&mut *conn)
                .create(&UserCreateDBRequest {
                    full_name: "Administrator".to_string(),
                    email,
                    password_hash,
                    role_id,
                    phone: None,
                    lifecycle: Lifecycle::Active,
                    created_by: None,
                })
                .await?;
            info!(user_id = %user.id, "created initial admin user");
            user.id
        }
    };

    Ok(Some(user_id))
}

/// Seed the permission registry, the super admin role and the initial admin user.
///
/// Safe to run on every start.
#[instrument(skip_all)]
pub async fn bootstrap(config: &Config, pool: &PgPool) -> anyhow::Result<()> {
    let mut tx = pool.begin().await?;

    let permission_ids = Permissions::new(&mut tx).ensure_all_keys().await?;
    let role_id = Roles::new(&mut tx)
        .upsert_system_role(SUPER_ADMIN_ROLE, "Super Admin", &permission_ids)
        .await?;
    create_initial_admin_user(
        &mut tx,
        &config.admin_email,
        config.admin_password.as_deref(),
        role_id,
        Argon2Params::from(&config.auth.password),
    )
    .await?;

    tx.commit().await?;
    info!(permissions = permission_ids.len(), "bootstrap complete");
    Ok(())
}

#[instrument(skip_all)]
async fn setup_database(config: &Config) -> anyhow::Result<PgPool> {
    let settings = &config.database.pool;
    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .min_connections(settings.min_connections)
        .acquire_timeout(Duration::from_secs(settings.acquire_timeout_secs))
        .connect(&config.database.url)
        .await?;

    migrator().run(&pool).await?;
    bootstrap(config, &pool).await?;

    Ok(pool)
}

/// Create CORS layer from configuration
fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let mut origins = Vec::new();
    for origin in &config.auth.cors.allowed_origins {
        let header_value = match origin {
            CorsOrigin::Wildcard => "*".parse::<HeaderValue>()?,
            CorsOrigin::Url(url) => url.as_str().trim_end_matches('/').parse::<HeaderValue>()?,
        };
        origins.push(header_value);
    }

    let mut cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_credentials(config.auth.cors.allow_credentials)
        .allow_methods([
            http::Method::GET,
            http::Method::POST,
            http::Method::PUT,
            http::Method::PATCH,
            http::Method::DELETE,
        ])
        .allow_headers([http::header::AUTHORIZATION, http::header::CONTENT_TYPE]);

    if let Some(max_age) = config.auth.cors.max_age {
        cors = cors.max_age(Duration::from_secs(max_age));
    }

    Ok(cors)
}

#[utoipa::path(
    get,
    path = "/",
    tag = "health",
    summary = "Health check",
    responses((status = 200, description = "Service is up", body = MessageResponse))
)]
pub async fn health() -> Json<MessageResponse> {
    Json(MessageResponse::new("Hostel management API is running"))
}

async fn route_not_found() -> errors::Error {
    errors::Error::not_found("Route", "")
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(health))
        // Auth
        .route("/auth/login", post(handlers::auth::login))
        .route("/auth/signup", post(handlers::auth::signup))
        // Permissions
        .route(
            "/permissions",
            post(handlers::permissions::create_permission).get(handlers::permissions::list_permissions),
        )
        .route(
            "/permissions/{id}",
            get(handlers::permissions::get_permission)
                .put(handlers::permissions::update_permission)
                .delete(handlers::permissions::delete_permission),
        )
        .route("/permissions/{id}/status", patch(handlers::permissions::toggle_permission_status))
        // Roles
        .route("/roles", post(handlers::roles::create_role).get(handlers::roles::list_roles))
        .route("/roles/{id}", get(handlers::roles::get_role).put(handlers::roles::update_role))
        .route("/roles/{id}/status", patch(handlers::roles::toggle_role_status))
        // Users
        .route("/users", get(handlers::users::list_users))
        .route("/users/profile", get(handlers::users::get_profile))
        .route("/users/{id}", get(handlers::users::get_user).put(handlers::users::update_user))
        .route("/users/{id}/status", patch(handlers::users::toggle_user_status))
        // Rooms
        .route("/rooms", post(handlers::rooms::create_room).get(handlers::rooms::list_rooms))
        .route(
            "/rooms/{id}",
            get(handlers::rooms::get_room)
                .put(handlers::rooms::update_room)
                .delete(handlers::rooms::delete_room),
        )
        .route("/rooms/{id}/status", patch(handlers::rooms::update_room_status))
        // Beds
        .route("/beds", post(handlers::beds::create_bed).get(handlers::beds::list_beds))
        .route("/beds/room/{roomId}", get(handlers::beds::list_beds_by_room))
        .route(
            "/beds/{id}",
            get(handlers::beds::get_bed)
                .put(handlers::beds::update_bed)
                .delete(handlers::beds::delete_bed),
        )
        .route("/beds/{id}/status", patch(handlers::beds::update_bed_status))
        .route("/beds/{id}/activate", patch(handlers::beds::activate_bed))
        // Members
        .route("/members", post(handlers::members::create_member).get(handlers::members::list_members))
        .route(
            "/members/{id}",
            get(handlers::members::get_member)
                .put(handlers::members::update_member)
                .delete(handlers::members::delete_member),
        )
        .route("/members/{id}/status", patch(handlers::members::update_member_status))
        // Bed assignments
        .route(
            "/bed-assignments",
            post(handlers::bed_assignments::create_assignment).get(handlers::bed_assignments::list_assignments),
        )
        .route(
            "/bed-assignments/member/{memberId}",
            get(handlers::bed_assignments::list_member_assignments),
        )
        .route(
            "/bed-assignments/{id}",
            get(handlers::bed_assignments::get_assignment)
                .put(handlers::bed_assignments::update_assignment)
                .delete(handlers::bed_assignments::delete_assignment),
        )
        .route("/bed-assignments/{id}/close", put(handlers::bed_assignments::close_assignment))
        // Food items
        .route(
            "/food-items",
            post(handlers::food_items::create_food_item).get(handlers::food_items::list_food_items),
        )
        .route(
            "/food-items/{id}",
            get(handlers::food_items::get_food_item)
                .put(handlers::food_items::update_food_item)
                .delete(handlers::food_items::delete_food_item),
        )
        // Food orders
        .route(
            "/food-orders",
            post(handlers::food_orders::create_food_order).get(handlers::food_orders::list_food_orders),
        )
        .route("/food-orders/member/{memberId}", get(handlers::food_orders::list_member_food_orders))
        .route(
            "/food-orders/{id}",
            get(handlers::food_orders::get_food_order)
                .put(handlers::food_orders::update_food_order)
                .delete(handlers::food_orders::delete_food_order),
        )
        .route("/food-orders/{id}/billing", put(handlers::food_orders::mark_food_order_billed))
        // Bills
        .route("/bills", post(handlers::bills::create_bill).get(handlers::bills::list_bills))
        .route(
            "/bills/{id}",
            get(handlers::bills::get_bill)
                .put(handlers::bills::update_bill)
                .delete(handlers::bills::delete_bill),
        )
        .route("/bills/{id}/payment", post(handlers::bills::add_payment))
        // Attendance
        .route("/attendance/mark-bulk", post(handlers::attendance::mark_bulk))
        .route("/attendance/sheet", get(handlers::attendance::get_sheet))
        .route("/attendance/member/{memberId}", get(handlers::attendance::member_history))
        .route("/attendance/room", get(handlers::attendance::room_attendance))
        .route("/attendance/{id}", delete(handlers::attendance::delete_attendance))
        // Visitors
        .route("/visitors", post(handlers::visitors::create_visitor).get(handlers::visitors::list_visitors))
        .route(
            "/visitors/{id}",
            get(handlers::visitors::get_visitor).delete(handlers::visitors::delete_visitor),
        )
        .route("/visitors/{id}/checkout", put(handlers::visitors::checkout_visitor))
        // Dashboard
        .route("/dashboard/refresh", post(handlers::dashboard::refresh_stats))
        .route("/dashboard/stats", get(handlers::dashboard::get_stats))
}

/// Build the main application router with all endpoints and middleware.
///
/// Layers, outermost first: tracing, CORS, then the rate limiter when it is enabled.
///
/// # Errors
///
/// Returns an error if the CORS configuration cannot be turned into header values.
#[instrument(skip_all)]
pub fn build_router(state: AppState) -> anyhow::Result<Router> {
    let cors_layer = create_cors_layer(&state.config)?;

    let mut router = Router::new()
        .nest("/api", api_routes())
        .fallback(route_not_found)
        .with_state(state.clone());

    if state.config.enable_openapi {
        router = router.merge(Scalar::with_url("/docs", ApiDoc::openapi()));
    }

    if state.config.rate_limit.enabled {
        router = router.layer(from_fn_with_state(state.rate_limiter.clone(), rate_limit_middleware));
    }

    let router = router.layer(
        ServiceBuilder::new()
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                    .on_request(DefaultOnRequest::new().level(Level::INFO))
                    .on_response(DefaultOnResponse::new().level(Level::INFO)),
            )
            .layer(cors_layer),
    );

    Ok(router)
}

pub struct Application {
    router: Router,
    config: Config,
    pool: PgPool,
}

impl Application {
    /// Connect to the database, run migrations and bootstrap, and build the router
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        debug!("Starting hostelctl with configuration: {:#?}", config);

        let pool = setup_database(&config).await?;

        let state = AppState::builder()
            .db(pool.clone())
            .config(config.clone())
            .rate_limiter(Arc::new(RateLimiter::new(&config.rate_limit)))
            .build();
        let router = build_router(state)?;

        Ok(Self { router, config, pool })
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!(
            "hostelctl listening on http://{}, available at http://localhost:{}",
            bind_addr, self.config.port
        );

        // Peer addresses feed the rate limiter
        axum::serve(listener, self.router.into_make_service_with_connect_info::<SocketAddr>())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Closing database connections...");
        self.pool.close().await;

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::{SUPER_ADMIN_ROLE, bootstrap};
    use crate::{
        api::models::{auth::LoginResponse, response::ApiResponse},
        config::RateLimitConfig,
        db::handlers::{Roles, Users},
        test_utils::*,
        types::PermissionKey,
    };
    use axum::http::StatusCode;
    use serde_json::json;
    use sqlx::PgPool;
    use std::time::Duration;

    #[sqlx::test]
    #[test_log::test]
    async fn test_health_needs_no_auth(pool: PgPool) {
        let app = create_test_app(pool).await;

        let response = app.get("/api").await;
        response.assert_status_ok();
        response.assert_json(&json!({"success": true, "message": "Hostel management API is running"}));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_unknown_route_uses_error_envelope(pool: PgPool) {
        let app = create_test_app(pool).await;

        let response = app.get("/api/nowhere").await;
        response.assert_status(StatusCode::NOT_FOUND);
        response.assert_json(&json!({"success": false, "message": "Route not found"}));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_bootstrap_is_idempotent_and_admin_can_log_in(pool: PgPool) {
        let mut config = create_test_config();
        config.admin_email = "Warden@Example.com".to_string();
        config.admin_password = Some("first-password".to_string());

        bootstrap(&config, &pool).await.unwrap();
        config.admin_password = Some("second-password".to_string());
        bootstrap(&config, &pool).await.unwrap();

        let mut conn = pool.acquire().await.unwrap();
        let role = Roles::new(&mut conn).get_by_code(SUPER_ADMIN_ROLE).await.unwrap().unwrap();
        assert!(role.is_system_role);
        assert_eq!(role.permissions.len(), PermissionKey::ALL.len());
        let admin = Users::new(&mut conn).get_by_email("warden@example.com").await.unwrap().unwrap();
        assert_eq!(admin.role_id, role.id);

        let app = create_test_app_with_config(pool.clone(), config).await;
        app.post("/api/auth/login")
            .json(&json!({"email": "warden@example.com", "password": "first-password"}))
            .await
            .assert_status(StatusCode::UNAUTHORIZED);

        let response = app
            .post("/api/auth/login")
            .json(&json!({"email": "warden@example.com", "password": "second-password"}))
            .await;
        response.assert_status_ok();
        let body: ApiResponse<LoginResponse> = response.json();
        let (name, value) = bearer_header(&body.data.unwrap().token);

        // The super admin reaches every guarded route
        app.get("/api/bills").add_header(name, value).await.assert_status_ok();
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_requests_over_limit_get_429(pool: PgPool) {
        let mut config = create_test_config();
        config.rate_limit = RateLimitConfig {
            enabled: true,
            max_requests: 3,
            window: Duration::from_secs(60),
            max_tracked_ips: 100,
        };
        let app = create_test_app_with_config(pool, config).await;

        for _ in 0..3 {
            app.get("/api")
                .add_header("x-forwarded-for", "203.0.113.7")
                .await
                .assert_status_ok();
        }

        let response = app.get("/api").add_header("x-forwarded-for", "203.0.113.7").await;
        response.assert_status(StatusCode::TOO_MANY_REQUESTS);
        assert!(response.headers().contains_key("retry-after"));
        let body: serde_json::Value = response.json();
        assert_eq!(body["message"], "Too many requests, please try again later.");

        // Another client is unaffected
        app.get("/api")
            .add_header("x-forwarded-for", "203.0.113.8")
            .await
            .assert_status_ok();
    }
}
