//! Database repository for users.

use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::users::{UserCreateDBRequest, UserDBResponse, UserUpdateDBRequest},
};
use crate::types::{Lifecycle, PermissionKey, RoleId, UserId, abbrev_uuid};
use sqlx::{FromRow, PgConnection, QueryBuilder};
use std::collections::HashMap;
use tracing::instrument;

const SELECT_USERS: &str = r#"
    SELECT u.id, u.full_name, u.email, u.password_hash, u.role_id, r.name AS role_name, r.code AS role_code,
           u.phone, u.lifecycle, u.last_login, u.created_by, u.created_at, u.updated_at
    FROM users u
    JOIN roles r ON r.id = u.role_id
"#;

/// Filter for listing users
#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    pub lifecycle: Option<Lifecycle>,
    pub role_id: Option<RoleId>,
}

/// What the request gate needs to know about a caller
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user: UserDBResponse,
    pub role_lifecycle: Lifecycle,
    pub permissions: Vec<PermissionKey>,
}

#[derive(Debug, FromRow)]
struct UserWithRoleState {
    #[sqlx(flatten)]
    user: UserDBResponse,
    role_lifecycle: Lifecycle,
}

pub struct Users<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Users<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, email), err)]
    pub async fn get_by_email(&mut self, email: &str) -> Result<Option<UserDBResponse>> {
        let user = sqlx::query_as::<_, UserDBResponse>(&format!("{SELECT_USERS} WHERE u.email = $1"))
            .bind(email.trim().to_lowercase())
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(user)
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&id)), err)]
    pub async fn touch_last_login(&mut self, id: UserId) -> Result<()> {
        sqlx::query("UPDATE users SET last_login = NOW() WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(())
    }

    /// Load a user together with its role state and the role's active permission keys.
    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&id)), err)]
    pub async fn auth_context(&mut self, id: UserId) -> Result<Option<AuthContext>> {
        let row = sqlx::query_as::<_, UserWithRoleState>(
            r#"
            SELECT u.id, u.full_name, u.email, u.password_hash, u.role_id, r.name AS role_name, r.code AS role_code,
                   u.phone, u.lifecycle, u.last_login, u.created_by, u.created_at, u.updated_at,
                   r.lifecycle AS role_lifecycle
            FROM users u
            JOIN roles r ON r.id = u.role_id
            WHERE u.id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *self.db)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let permissions = sqlx::query_scalar::<_, PermissionKey>(
            r#"
            SELECT p.key
            FROM role_permissions rp
            JOIN permissions p ON p.id = rp.permission_id
            WHERE rp.role_id = $1 AND p.lifecycle = 'ACTIVE'
            "#,
        )
        .bind(row.user.role_id)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(Some(AuthContext {
            user: row.user,
            role_lifecycle: row.role_lifecycle,
            permissions,
        }))
    }

    /// Reset the stored hash, used when re-seeding the bootstrap admin.
    #[instrument(skip(self, password_hash), fields(user_id = %abbrev_uuid(&id)), err)]
    pub async fn set_password_hash(&mut self, id: UserId, password_hash: &str) -> Result<()> {
        let result = sqlx::query("UPDATE users SET password_hash = $2, lifecycle = 'ACTIVE', updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .execute(&mut *self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl<'c> Repository for Users<'c> {
    type CreateRequest = UserCreateDBRequest;
    type UpdateRequest = UserUpdateDBRequest;
    type Response = UserDBResponse;
    type Id = UserId;
    type Filter = UserFilter;

    #[instrument(skip(self, request), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let id: UserId = sqlx::query_scalar(
            r#"
            INSERT INTO users (full_name, email, password_hash, role_id, phone, lifecycle, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            "#,
        )
        .bind(&request.full_name)
        .bind(request.email.trim().to_lowercase())
        .bind(&request.password_hash)
        .bind(request.role_id)
        .bind(&request.phone)
        .bind(request.lifecycle)
        .bind(request.created_by)
        .fetch_one(&mut *self.db)
        .await?;

        self.get_by_id(id).await?.ok_or(DbError::NotFound)
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let user = sqlx::query_as::<_, UserDBResponse>(&format!("{SELECT_USERS} WHERE u.id = $1"))
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(user)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<Self::Id>) -> Result<HashMap<Self::Id, Self::Response>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let users = sqlx::query_as::<_, UserDBResponse>(&format!("{SELECT_USERS} WHERE u.id = ANY($1)"))
            .bind(&ids)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(users.into_iter().map(|u| (u.id, u)).collect())
    }

    #[instrument(skip(self, filter), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let mut query = QueryBuilder::new(SELECT_USERS);
        query.push(" WHERE TRUE");
        if let Some(lifecycle) = filter.lifecycle {
            query.push(" AND u.lifecycle = ").push_bind(lifecycle);
        }
        if let Some(role_id) = filter.role_id {
            query.push(" AND u.role_id = ").push_bind(role_id);
        }
        query.push(" ORDER BY u.created_at DESC");

        let users = query.build_query_as::<UserDBResponse>().fetch_all(&mut *self.db).await?;
        Ok(users)
    }

    /// Soft delete
    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("UPDATE users SET lifecycle = 'INACTIVE', updated_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(user_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let updated = sqlx::query(
            r#"
            UPDATE users SET
                full_name = COALESCE($2, full_name),
                phone = COALESCE($3, phone),
                role_id = COALESCE($4, role_id),
                lifecycle = COALESCE($5, lifecycle),
                password_hash = COALESCE($6, password_hash),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&request.full_name)
        .bind(&request.phone)
        .bind(request.role_id)
        .bind(request.lifecycle)
        .bind(&request.password_hash)
        .execute(&mut *self.db)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }
        self.get_by_id(id).await?.ok_or(DbError::NotFound)
    }
}
