//! Database repository for the permission registry.

use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::permissions::{PermissionCreateDBRequest, PermissionDBResponse, PermissionUpdateDBRequest},
};
use crate::types::{Lifecycle, PermissionId, PermissionKey, abbrev_uuid};
use sqlx::{PgConnection, QueryBuilder};
use std::collections::HashMap;
use tracing::instrument;

const SELECT_PERMISSIONS: &str = "SELECT id, name, key, module, description, lifecycle, created_at, updated_at FROM permissions";

/// Filter for listing permissions
#[derive(Debug, Clone, Default)]
pub struct PermissionFilter {
    pub module: Option<String>,
    pub lifecycle: Option<Lifecycle>,
}

pub struct Permissions<'c> {
    db: &'c mut PgConnection,
}

/// Human readable name for a key, e.g. `ROOM_CREATE` -> `Room Create`.
pub fn default_name(key: PermissionKey) -> String {
    key.as_str()
        .split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_string() + &chars.as_str().to_lowercase(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[async_trait::async_trait]
impl<'c> Repository for Permissions<'c> {
    type CreateRequest = PermissionCreateDBRequest;
    type UpdateRequest = PermissionUpdateDBRequest;
    type Response = PermissionDBResponse;
    type Id = PermissionId;
    type Filter = PermissionFilter;

    #[instrument(skip(self, request), fields(key = %request.key), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let permission = sqlx::query_as::<_, PermissionDBResponse>(
            r#"
            INSERT INTO permissions (name, key, module, description)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, key, module, description, lifecycle, created_at, updated_at
            "#,
        )
        .bind(&request.name)
        .bind(request.key)
        .bind(&request.module)
        .bind(&request.description)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(permission)
    }

    #[instrument(skip(self), fields(permission_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let permission = sqlx::query_as::<_, PermissionDBResponse>(&format!("{SELECT_PERMISSIONS} WHERE id = $1"))
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(permission)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<Self::Id>) -> Result<HashMap<Self::Id, Self::Response>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let permissions = sqlx::query_as::<_, PermissionDBResponse>(&format!("{SELECT_PERMISSIONS} WHERE id = ANY($1)"))
            .bind(&ids)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(permissions.into_iter().map(|p| (p.id, p)).collect())
    }

    #[instrument(skip(self, filter), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let mut query = QueryBuilder::new(SELECT_PERMISSIONS);
        query.push(" WHERE TRUE");
        if let Some(module) = &filter.module {
            query.push(" AND module = ").push_bind(module.clone());
        }
        if let Some(lifecycle) = filter.lifecycle {
            query.push(" AND lifecycle = ").push_bind(lifecycle);
        }
        query.push(" ORDER BY module, key");

        let permissions = query
            .build_query_as::<PermissionDBResponse>()
            .fetch_all(&mut *self.db)
            .await?;

        Ok(permissions)
    }

    /// Soft delete
    #[instrument(skip(self), fields(permission_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("UPDATE permissions SET lifecycle = 'INACTIVE', updated_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(permission_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let permission = sqlx::query_as::<_, PermissionDBResponse>(
            r#"
            UPDATE permissions SET
                name = COALESCE($2, name),
                module = COALESCE($3, module),
                description = COALESCE($4, description),
                lifecycle = COALESCE($5, lifecycle),
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, name, key, module, description, lifecycle, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(&request.name)
        .bind(&request.module)
        .bind(&request.description)
        .bind(request.lifecycle)
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        Ok(permission)
    }
}

impl<'c> Permissions<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Make sure a registry row exists for every known key. Existing rows are left untouched.
    ///
    /// Returns the ids of every key's row, in [`PermissionKey::ALL`] order.
    #[instrument(skip(self), err)]
    pub async fn ensure_all_keys(&mut self) -> Result<Vec<PermissionId>> {
        let mut ids = Vec::with_capacity(PermissionKey::ALL.len());
        for key in PermissionKey::ALL {
            sqlx::query(
                r#"
                INSERT INTO permissions (name, key, module, description)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (key) DO NOTHING
                "#,
            )
            .bind(default_name(*key))
            .bind(*key)
            .bind(key.module())
            .bind(format!("Allows {}", default_name(*key).to_lowercase()))
            .execute(&mut *self.db)
            .await?;

            let id: PermissionId = sqlx::query_scalar("SELECT id FROM permissions WHERE key = $1")
                .bind(*key)
                .fetch_one(&mut *self.db)
                .await?;
            ids.push(id);
        }
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::PgPool;

    #[test]
    fn test_default_name() {
        assert_eq!(default_name(PermissionKey::RoomCreate), "Room Create");
        assert_eq!(default_name(PermissionKey::ViewBedAssignments), "View Bed Assignments");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_ensure_all_keys_is_idempotent(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Permissions::new(&mut conn);

        let first = repo.ensure_all_keys().await.unwrap();
        let second = repo.ensure_all_keys().await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), PermissionKey::ALL.len());

        let all = repo.list(&PermissionFilter::default()).await.unwrap();
        assert_eq!(all.len(), PermissionKey::ALL.len());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_update_and_soft_delete(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Permissions::new(&mut conn);

        let created = repo
            .create(&PermissionCreateDBRequest {
                name: "Create rooms".to_string(),
                key: PermissionKey::RoomCreate,
                module: "room".to_string(),
                description: None,
            })
            .await
            .unwrap();
        assert_eq!(created.lifecycle, Lifecycle::Active);

        let updated = repo
            .update(
                created.id,
                &PermissionUpdateDBRequest {
                    description: Some("Add rooms to the facility".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "Create rooms");
        assert_eq!(updated.key, PermissionKey::RoomCreate);
        assert_eq!(updated.description.as_deref(), Some("Add rooms to the facility"));

        assert!(repo.delete(created.id).await.unwrap());
        let active = repo
            .list(&PermissionFilter {
                lifecycle: Some(Lifecycle::Active),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(active.iter().all(|p| p.id != created.id));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_duplicate_key_is_unique_violation(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Permissions::new(&mut conn);
        let request = PermissionCreateDBRequest {
            name: "View rooms".to_string(),
            key: PermissionKey::RoomView,
            module: "room".to_string(),
            description: None,
        };
        repo.create(&request).await.unwrap();

        let again = PermissionCreateDBRequest {
            name: "View rooms again".to_string(),
            ..request
        };
        let err = repo.create(&again).await.unwrap_err();
        assert_eq!(err.constraint(), Some("permissions_key_unique"));
    }
}
