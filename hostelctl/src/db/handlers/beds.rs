//! Database repository for beds.

use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::beds::{BedCreateDBRequest, BedDBResponse, BedStatus, BedUpdateDBRequest},
};
use crate::types::{BedId, Lifecycle, RoomId, abbrev_uuid};
use sqlx::{PgConnection, QueryBuilder};
use std::collections::HashMap;
use tracing::instrument;

const SELECT_BEDS: &str = r#"
    SELECT b.id, b.bed_number, b.room_id, r.room_number, b.status, b.created_by, b.lifecycle, b.created_at, b.updated_at
    FROM beds b
    JOIN rooms r ON r.id = b.room_id
"#;

/// Filter for listing beds
#[derive(Debug, Clone, Default)]
pub struct BedFilter {
    pub room_id: Option<RoomId>,
    pub status: Option<BedStatus>,
    pub lifecycle: Option<Lifecycle>,
}

pub struct Beds<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Beds<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self), fields(bed_id = %abbrev_uuid(&id)), err)]
    pub async fn lock(&mut self, id: BedId) -> Result<Option<BedDBResponse>> {
        let bed = sqlx::query_as::<_, BedDBResponse>(&format!("{SELECT_BEDS} WHERE b.id = $1 FOR UPDATE OF b"))
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(bed)
    }

    /// Number of active-lifecycle beds in a room, whatever their status.
    #[instrument(skip(self), fields(room_id = %abbrev_uuid(&room_id)), err)]
    pub async fn count_active_in_room(&mut self, room_id: RoomId) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM beds WHERE room_id = $1 AND lifecycle = 'ACTIVE'")
            .bind(room_id)
            .fetch_one(&mut *self.db)
            .await?;

        Ok(count)
    }

    /// Any bed in the room currently marked occupied.
    #[instrument(skip(self), fields(room_id = %abbrev_uuid(&room_id)), err)]
    pub async fn room_has_occupied(&mut self, room_id: RoomId) -> Result<bool> {
        let occupied: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM beds WHERE room_id = $1 AND status = 'OCCUPIED' AND lifecycle = 'ACTIVE')",
        )
        .bind(room_id)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(occupied)
    }

    #[instrument(skip(self), fields(bed_id = %abbrev_uuid(&id), status = ?status), err)]
    pub async fn set_status(&mut self, id: BedId, status: BedStatus) -> Result<()> {
        let result = sqlx::query("UPDATE beds SET status = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(status)
            .execute(&mut *self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl<'c> Repository for Beds<'c> {
    type CreateRequest = BedCreateDBRequest;
    type UpdateRequest = BedUpdateDBRequest;
    type Response = BedDBResponse;
    type Id = BedId;
    type Filter = BedFilter;

    #[instrument(skip(self, request), fields(room_id = %abbrev_uuid(&request.room_id)), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let id: BedId = sqlx::query_scalar(
            r#"
            INSERT INTO beds (bed_number, room_id, created_by)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(&request.bed_number)
        .bind(request.room_id)
        .bind(request.created_by)
        .fetch_one(&mut *self.db)
        .await?;

        self.get_by_id(id).await?.ok_or(DbError::NotFound)
    }

    #[instrument(skip(self), fields(bed_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let bed = sqlx::query_as::<_, BedDBResponse>(&format!("{SELECT_BEDS} WHERE b.id = $1"))
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(bed)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<Self::Id>) -> Result<HashMap<Self::Id, Self::Response>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let beds = sqlx::query_as::<_, BedDBResponse>(&format!("{SELECT_BEDS} WHERE b.id = ANY($1)"))
            .bind(&ids)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(beds.into_iter().map(|b| (b.id, b)).collect())
    }

    #[instrument(skip(self, filter), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let mut query = QueryBuilder::new(SELECT_BEDS);
        query.push(" WHERE TRUE");
        if let Some(room_id) = filter.room_id {
            query.push(" AND b.room_id = ").push_bind(room_id);
        }
        if let Some(status) = filter.status {
            query.push(" AND b.status = ").push_bind(status);
        }
        if let Some(lifecycle) = filter.lifecycle {
            query.push(" AND b.lifecycle = ").push_bind(lifecycle);
        }
        query.push(" ORDER BY r.room_number, b.bed_number");

        let beds = query.build_query_as::<BedDBResponse>().fetch_all(&mut *self.db).await?;
        Ok(beds)
    }

    /// Soft delete
    #[instrument(skip(self), fields(bed_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("UPDATE beds SET lifecycle = 'INACTIVE', updated_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(bed_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let updated = sqlx::query(
            r#"
            UPDATE beds SET
                bed_number = COALESCE($2, bed_number),
                status = COALESCE($3, status),
                lifecycle = COALESCE($4, lifecycle),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&request.bed_number)
        .bind(request.status)
        .bind(request.lifecycle)
        .execute(&mut *self.db)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }
        self.get_by_id(id).await?.ok_or(DbError::NotFound)
    }
}
