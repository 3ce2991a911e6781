//! Test utilities for integration testing (available with `test-utils` feature).

use crate::{
    AppState,
    auth::{
        password::{Argon2Params, hash_string_with_params},
        session::create_session_token,
    },
    config::{Config, PoolSettings, RateLimitConfig},
    db::{
        handlers::{Beds, Members, Permissions, Repository, Roles, Rooms, Users},
        models::{
            beds::{BedCreateDBRequest, BedDBResponse},
            members::{MemberCreateDBRequest, MemberDBResponse},
            roles::RoleCreateDBRequest,
            rooms::{RoomCreateDBRequest, RoomDBResponse, RoomType},
            users::{UserCreateDBRequest, UserDBResponse},
        },
    },
    rate_limit::RateLimiter,
    types::{Lifecycle, PermissionKey, RoleId, RoomId},
};
use axum::http::{HeaderName, HeaderValue, header};
use axum_test::TestServer;
use rust_decimal::Decimal;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

/// Password every test user is created with
pub const TEST_PASSWORD: &str = "test-password-123";

/// Cheap hashing parameters; the production defaults make every test user cost ~50ms
pub const TEST_ARGON2: Argon2Params = Argon2Params {
    memory_kib: 1024,
    iterations: 1,
    parallelism: 1,
};

pub fn create_test_config() -> Config {
    let mut config = Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        admin_email: "admin@test.com".to_string(),
        admin_password: None,
        secret_key: Some("test-secret-key-for-testing-only".to_string()),
        enable_openapi: false,
        ..Default::default()
    };
    config.database.pool = PoolSettings {
        max_connections: 2,
        min_connections: 0,
        ..Default::default()
    };
    config.auth.password.argon2_memory_kib = TEST_ARGON2.memory_kib;
    config.auth.password.argon2_iterations = TEST_ARGON2.iterations;
    config.rate_limit = RateLimitConfig {
        enabled: false,
        ..Default::default()
    };
    config
}

pub fn create_test_state_with_config(pool: PgPool, config: Config) -> AppState {
    let rate_limiter = Arc::new(RateLimiter::new(&config.rate_limit));
    AppState::builder().db(pool).config(config).rate_limiter(rate_limiter).build()
}

pub fn create_test_state(pool: PgPool) -> AppState {
    create_test_state_with_config(pool, create_test_config())
}

pub async fn create_test_app(pool: PgPool) -> TestServer {
    create_test_app_with_config(pool, create_test_config()).await
}

pub async fn create_test_app_with_config(pool: PgPool, config: Config) -> TestServer {
    let state = create_test_state_with_config(pool, config);
    let router = crate::build_router(state).expect("Failed to build router");
    TestServer::new(router).expect("Failed to create test server")
}

/// A fresh role holding exactly `keys`
pub async fn create_test_role(pool: &PgPool, keys: &[PermissionKey]) -> RoleId {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    let all_ids = Permissions::new(&mut conn)
        .ensure_all_keys()
        .await
        .expect("Failed to seed permissions");

    // ensure_all_keys returns ids in PermissionKey::ALL order
    let permission_ids = PermissionKey::ALL
        .iter()
        .zip(all_ids)
        .filter(|(key, _)| keys.contains(*key))
        .map(|(_, id)| id)
        .collect();

    let suffix = Uuid::new_v4().simple().to_string();
    Roles::new(&mut conn)
        .create(&RoleCreateDBRequest {
            name: format!("Test Role {suffix}"),
            code: format!("TEST_{}", suffix.to_uppercase()),
            description: None,
            permission_ids,
            is_system_role: false,
        })
        .await
        .expect("Failed to create test role")
        .id
}

/// A fresh active user whose role holds exactly `keys`
pub async fn create_test_user(pool: &PgPool, keys: &[PermissionKey]) -> UserDBResponse {
    let role_id = create_test_role(pool, keys).await;
    let password_hash = hash_string_with_params(TEST_PASSWORD, TEST_ARGON2).expect("Failed to hash password");

    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    Users::new(&mut conn)
        .create(&UserCreateDBRequest {
            full_name: "Test User".to_string(),
            email: format!("user_{}@example.com", Uuid::new_v4().simple()),
            password_hash,
            role_id,
            phone: None,
            lifecycle: Lifecycle::Active,
            created_by: None,
        })
        .await
        .expect("Failed to create test user")
}

/// A user holding every permission key
pub async fn create_test_admin(pool: &PgPool) -> UserDBResponse {
    create_test_user(pool, PermissionKey::ALL).await
}

pub fn bearer_header(token: &str) -> (HeaderName, HeaderValue) {
    let value = HeaderValue::from_str(&format!("Bearer {token}")).expect("Invalid token characters");
    (header::AUTHORIZATION, value)
}

/// `Authorization` header carrying a session token for `user`
pub fn auth_header(user: &UserDBResponse) -> (HeaderName, HeaderValue) {
    let token = create_session_token(user.id, &user.role_code, &create_test_config()).expect("Failed to create token");
    bearer_header(&token)
}

pub async fn create_test_room(pool: &PgPool, room_number: &str, total_beds: i32, rent_per_bed: i64) -> RoomDBResponse {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    let room_type = match total_beds {
        1 => RoomType::Single,
        2 => RoomType::Double,
        _ => RoomType::Triple,
    };
    Rooms::new(&mut conn)
        .create(&RoomCreateDBRequest {
            room_number: room_number.to_string(),
            floor: 1,
            total_beds,
            room_type,
            rent_per_bed: Decimal::from(rent_per_bed),
            has_ac: false,
            has_washroom: true,
            created_by: None,
        })
        .await
        .expect("Failed to create test room")
}

pub async fn create_test_bed(pool: &PgPool, room_id: RoomId, bed_number: &str) -> BedDBResponse {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    Beds::new(&mut conn)
        .create(&BedCreateDBRequest {
            bed_number: bed_number.to_string(),
            room_id,
            created_by: None,
        })
        .await
        .expect("Failed to create test bed")
}

pub async fn create_test_member(pool: &PgPool, member_code: &str) -> MemberDBResponse {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    // CNIC must be unique too; derive it from a random id
    let digits = Uuid::new_v4().as_u128() % 10_000_000;
    Members::new(&mut conn)
        .create(&MemberCreateDBRequest {
            member_code: member_code.to_string(),
            full_name: format!("Member {member_code}"),
            cnic: format!("35202-{digits:07}-1"),
            phone: "0300-0000000".to_string(),
            guardian_name: "Guardian".to_string(),
            guardian_phone: None,
            institute_name: None,
            address: None,
            join_date: None,
            created_by: None,
        })
        .await
        .expect("Failed to create test member")
}
