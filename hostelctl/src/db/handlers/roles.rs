//! Database repository for roles and their permission sets.

use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::{
        permissions::PermissionDBResponse,
        roles::{RoleCreateDBRequest, RoleDBResponse, RoleUpdateDBRequest},
    },
};
use crate::types::{Lifecycle, PermissionId, PermissionKey, RoleId, abbrev_uuid};
use chrono::{DateTime, Utc};
use sqlx::{Connection, FromRow, PgConnection, QueryBuilder};
use std::collections::HashMap;
use tracing::instrument;

const SELECT_ROLES: &str =
    "SELECT id, name, code, description, is_system_role, lifecycle, created_at, updated_at FROM roles";

/// Filter for listing roles
#[derive(Debug, Clone, Default)]
pub struct RoleFilter {
    pub lifecycle: Option<Lifecycle>,
}

// Database entity model
#[derive(Debug, Clone, FromRow)]
struct Role {
    id: RoleId,
    name: String,
    code: String,
    description: Option<String>,
    is_system_role: bool,
    lifecycle: Lifecycle,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct RolePermission {
    role_id: RoleId,
    #[sqlx(flatten)]
    permission: PermissionDBResponse,
}

impl From<(Vec<PermissionDBResponse>, Role)> for RoleDBResponse {
    fn from((permissions, role): (Vec<PermissionDBResponse>, Role)) -> Self {
        Self {
            id: role.id,
            name: role.name,
            code: role.code,
            description: role.description,
            is_system_role: role.is_system_role,
            lifecycle: role.lifecycle,
            permissions,
            created_at: role.created_at,
            updated_at: role.updated_at,
        }
    }
}

pub struct Roles<'c> {
    db: &'c mut PgConnection,
}

async fn replace_permissions(db: &mut PgConnection, role_id: RoleId, permission_ids: &[PermissionId]) -> Result<()> {
    sqlx::query("DELETE FROM role_permissions WHERE role_id = $1")
        .bind(role_id)
        .execute(&mut *db)
        .await?;

    sqlx::query(
        r#"
        INSERT INTO role_permissions (role_id, permission_id, position)
        SELECT $1, t.permission_id, (t.ord - 1)::INTEGER
        FROM UNNEST($2::UUID[]) WITH ORDINALITY AS t(permission_id, ord)
        "#,
    )
    .bind(role_id)
    .bind(permission_ids)
    .execute(&mut *db)
    .await?;

    Ok(())
}

impl<'c> Roles<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Expanded permissions for each role, in stored order
    async fn permissions_for(&mut self, role_ids: &[RoleId]) -> Result<HashMap<RoleId, Vec<PermissionDBResponse>>> {
        let rows = sqlx::query_as::<_, RolePermission>(
            r#"
            SELECT rp.role_id, p.id, p.name, p.key, p.module, p.description, p.lifecycle, p.created_at, p.updated_at
            FROM role_permissions rp
            JOIN permissions p ON p.id = rp.permission_id
            WHERE rp.role_id = ANY($1)
            ORDER BY rp.role_id, rp.position
            "#,
        )
        .bind(role_ids)
        .fetch_all(&mut *self.db)
        .await?;

        let mut map: HashMap<RoleId, Vec<PermissionDBResponse>> = HashMap::new();
        for row in rows {
            map.entry(row.role_id).or_default().push(row.permission);
        }
        Ok(map)
    }

    async fn expand(&mut self, roles: Vec<Role>) -> Result<Vec<RoleDBResponse>> {
        let ids: Vec<RoleId> = roles.iter().map(|r| r.id).collect();
        let mut permissions = self.permissions_for(&ids).await?;
        Ok(roles
            .into_iter()
            .map(|role| {
                let granted = permissions.remove(&role.id).unwrap_or_default();
                RoleDBResponse::from((granted, role))
            })
            .collect())
    }

    /// Keys granted by a role, skipping inactive permission rows.
    #[instrument(skip(self), fields(role_id = %abbrev_uuid(&role_id)), err)]
    pub async fn active_permission_keys(&mut self, role_id: RoleId) -> Result<Vec<PermissionKey>> {
        let keys = sqlx::query_scalar::<_, PermissionKey>(
            r#"
            SELECT p.key
            FROM role_permissions rp
            JOIN permissions p ON p.id = rp.permission_id
            WHERE rp.role_id = $1 AND p.lifecycle = 'ACTIVE'
            ORDER BY rp.position
            "#,
        )
        .bind(role_id)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(keys)
    }

    #[instrument(skip(self), err)]
    pub async fn get_by_code(&mut self, code: &str) -> Result<Option<RoleDBResponse>> {
        let role = sqlx::query_as::<_, Role>(&format!("{SELECT_ROLES} WHERE code = $1"))
            .bind(code)
            .fetch_optional(&mut *self.db)
            .await?;

        match role {
            Some(role) => Ok(self.expand(vec![role]).await?.pop()),
            None => Ok(None),
        }
    }

    /// Create or refresh a system role so that it holds exactly `permission_ids`.
    #[instrument(skip(self, permission_ids), fields(count = permission_ids.len()), err)]
    pub async fn upsert_system_role(&mut self, code: &str, name: &str, permission_ids: &[PermissionId]) -> Result<RoleId> {
        let mut tx = self.db.begin().await?;

        let role_id: RoleId = sqlx::query_scalar(
            r#"
            INSERT INTO roles (name, code, description, is_system_role)
            VALUES ($1, $2, 'Built-in role holding every permission', TRUE)
            ON CONFLICT (code) DO UPDATE SET
                is_system_role = TRUE,
                lifecycle = 'ACTIVE',
                updated_at = NOW()
            RETURNING id
            "#,
        )
        .bind(name)
        .bind(code)
        .fetch_one(&mut *tx)
        .await?;

        replace_permissions(&mut tx, role_id, permission_ids).await?;
        tx.commit().await?;

        Ok(role_id)
    }
}

#[async_trait::async_trait]
impl<'c> Repository for Roles<'c> {
    type CreateRequest = RoleCreateDBRequest;
    type UpdateRequest = RoleUpdateDBRequest;
    type Response = RoleDBResponse;
    type Id = RoleId;
    type Filter = RoleFilter;

    #[instrument(skip(self, request), fields(code = %request.code), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let mut tx = self.db.begin().await?;

        let role = sqlx::query_as::<_, Role>(
            r#"
            INSERT INTO roles (name, code, description, is_system_role)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, code, description, is_system_role, lifecycle, created_at, updated_at
            "#,
        )
        .bind(&request.name)
        .bind(&request.code)
        .bind(&request.description)
        .bind(request.is_system_role)
        .fetch_one(&mut *tx)
        .await?;

        replace_permissions(&mut tx, role.id, &request.permission_ids).await?;
        tx.commit().await?;

        Ok(self.expand(vec![role]).await?.remove(0))
    }

    #[instrument(skip(self), fields(role_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let role = sqlx::query_as::<_, Role>(&format!("{SELECT_ROLES} WHERE id = $1"))
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        match role {
            Some(role) => Ok(self.expand(vec![role]).await?.pop()),
            None => Ok(None),
        }
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<Self::Id>) -> Result<HashMap<Self::Id, Self::Response>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let roles = sqlx::query_as::<_, Role>(&format!("{SELECT_ROLES} WHERE id = ANY($1)"))
            .bind(&ids)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(self.expand(roles).await?.into_iter().map(|r| (r.id, r)).collect())
    }

    #[instrument(skip(self, filter), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let mut query = QueryBuilder::new(SELECT_ROLES);
        if let Some(lifecycle) = filter.lifecycle {
            query.push(" WHERE lifecycle = ").push_bind(lifecycle);
        }
        query.push(" ORDER BY created_at DESC");

        let roles = query.build_query_as::<Role>().fetch_all(&mut *self.db).await?;
        self.expand(roles).await
    }

    /// Soft delete
    #[instrument(skip(self), fields(role_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("UPDATE roles SET lifecycle = 'INACTIVE', updated_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(role_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let role;
        {
            let mut tx = self.db.begin().await?;

            role = sqlx::query_as::<_, Role>(
                r#"
                UPDATE roles SET
                    name = COALESCE($2, name),
                    description = COALESCE($3, description),
                    lifecycle = COALESCE($4, lifecycle),
                    updated_at = NOW()
                WHERE id = $1
                RETURNING id, name, code, description, is_system_role, lifecycle, created_at, updated_at
                "#,
            )
            .bind(id)
            .bind(&request.name)
            .bind(&request.description)
            .bind(request.lifecycle)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(DbError::NotFound)?;

            if let Some(permission_ids) = &request.permission_ids {
                replace_permissions(&mut tx, id, permission_ids).await?;
            }
            tx.commit().await?;
        }

        Ok(self.expand(vec![role]).await?.remove(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::handlers::Permissions;
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_role_keeps_permission_order(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let ids = Permissions::new(&mut conn).ensure_all_keys().await.unwrap();
        let chosen = vec![ids[5], ids[0], ids[3]];

        let mut repo = Roles::new(&mut conn);
        let role = repo
            .create(&RoleCreateDBRequest {
                name: "Warden".to_string(),
                code: "WARDEN".to_string(),
                description: None,
                permission_ids: chosen.clone(),
                is_system_role: false,
            })
            .await
            .unwrap();

        let stored: Vec<PermissionId> = role.permissions.iter().map(|p| p.id).collect();
        assert_eq!(stored, chosen);

        let keys = repo.active_permission_keys(role.id).await.unwrap();
        assert_eq!(keys.len(), 3);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_update_replaces_permissions(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let ids = Permissions::new(&mut conn).ensure_all_keys().await.unwrap();

        let mut repo = Roles::new(&mut conn);
        let role = repo
            .create(&RoleCreateDBRequest {
                name: "Mess Manager".to_string(),
                code: "MESS_MANAGER".to_string(),
                description: None,
                permission_ids: vec![ids[0], ids[1]],
                is_system_role: false,
            })
            .await
            .unwrap();

        let updated = repo
            .update(
                role.id,
                &RoleUpdateDBRequest {
                    description: Some("Runs the kitchen".to_string()),
                    permission_ids: Some(vec![ids[2]]),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.permissions.len(), 1);
        assert_eq!(updated.permissions[0].id, ids[2]);
        assert_eq!(updated.description.as_deref(), Some("Runs the kitchen"));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_upsert_system_role_is_idempotent(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let ids = Permissions::new(&mut conn).ensure_all_keys().await.unwrap();

        let mut repo = Roles::new(&mut conn);
        let first = repo.upsert_system_role("SUPER_ADMIN", "Super Admin", &ids).await.unwrap();
        let second = repo.upsert_system_role("SUPER_ADMIN", "Super Admin", &ids).await.unwrap();
        assert_eq!(first, second);

        let role = repo.get_by_code("SUPER_ADMIN").await.unwrap().unwrap();
        assert!(role.is_system_role);
        assert_eq!(role.permissions.len(), PermissionKey::ALL.len());
    }
}
