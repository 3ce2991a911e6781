//! Database repository for rooms.

use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::rooms::{RoomCreateDBRequest, RoomDBResponse, RoomStatus, RoomType, RoomUpdateDBRequest},
};
use crate::types::{Lifecycle, RoomId, abbrev_uuid};
use sqlx::{PgConnection, QueryBuilder};
use std::collections::HashMap;
use tracing::instrument;

const SELECT_ROOMS: &str = r#"
    SELECT r.id, r.room_number, r.floor, r.total_beds, r.room_type, r.rent_per_bed, r.status,
           r.has_ac, r.has_washroom,
           (SELECT COUNT(*) FROM beds b WHERE b.room_id = r.id AND b.status = 'OCCUPIED' AND b.lifecycle = 'ACTIVE') AS occupied_beds,
           r.created_by, r.lifecycle, r.created_at, r.updated_at
    FROM rooms r
"#;

/// Filter for listing rooms
#[derive(Debug, Clone, Default)]
pub struct RoomFilter {
    pub status: Option<RoomStatus>,
    pub room_type: Option<RoomType>,
    pub floor: Option<i32>,
    pub lifecycle: Option<Lifecycle>,
}

pub struct Rooms<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Rooms<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Fetch a room and hold its row lock until the surrounding transaction ends.
    #[instrument(skip(self), fields(room_id = %abbrev_uuid(&id)), err)]
    pub async fn lock(&mut self, id: RoomId) -> Result<Option<RoomDBResponse>> {
        let room = sqlx::query_as::<_, RoomDBResponse>(&format!("{SELECT_ROOMS} WHERE r.id = $1 FOR UPDATE OF r"))
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(room)
    }

    /// Re-derive the cached status from the live count of occupied beds.
    ///
    /// Must run on the same transaction as the bed status change it follows.
    #[instrument(skip(self), fields(room_id = %abbrev_uuid(&id)), err)]
    pub async fn recompute_status(&mut self, id: RoomId) -> Result<RoomStatus> {
        let room = self.lock(id).await?.ok_or(DbError::NotFound)?;
        let status = RoomStatus::derive(room.status, room.occupied_beds, room.total_beds);

        if status != room.status {
            sqlx::query("UPDATE rooms SET status = $2, updated_at = NOW() WHERE id = $1")
                .bind(id)
                .bind(status)
                .execute(&mut *self.db)
                .await?;
            tracing::debug!(from = ?room.status, to = ?status, "Room status recomputed");
        }

        Ok(status)
    }
}

#[async_trait::async_trait]
impl<'c> Repository for Rooms<'c> {
    type CreateRequest = RoomCreateDBRequest;
    type UpdateRequest = RoomUpdateDBRequest;
    type Response = RoomDBResponse;
    type Id = RoomId;
    type Filter = RoomFilter;

    #[instrument(skip(self, request), fields(room_number = %request.room_number), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let id: RoomId = sqlx::query_scalar(
            r#"
            INSERT INTO rooms (room_number, floor, total_beds, room_type, rent_per_bed, has_ac, has_washroom, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id
            "#,
        )
        .bind(&request.room_number)
        .bind(request.floor)
        .bind(request.total_beds)
        .bind(request.room_type)
        .bind(request.rent_per_bed)
        .bind(request.has_ac)
        .bind(request.has_washroom)
        .bind(request.created_by)
        .fetch_one(&mut *self.db)
        .await?;

        self.get_by_id(id).await?.ok_or(DbError::NotFound)
    }

    #[instrument(skip(self), fields(room_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let room = sqlx::query_as::<_, RoomDBResponse>(&format!("{SELECT_ROOMS} WHERE r.id = $1"))
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(room)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<Self::Id>) -> Result<HashMap<Self::Id, Self::Response>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rooms = sqlx::query_as::<_, RoomDBResponse>(&format!("{SELECT_ROOMS} WHERE r.id = ANY($1)"))
            .bind(&ids)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(rooms.into_iter().map(|r| (r.id, r)).collect())
    }

    #[instrument(skip(self, filter), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let mut query = QueryBuilder::new(SELECT_ROOMS);
        query.push(" WHERE TRUE");
        if let Some(status) = filter.status {
            query.push(" AND r.status = ").push_bind(status);
        }
        if let Some(room_type) = filter.room_type {
            query.push(" AND r.room_type = ").push_bind(room_type);
        }
        if let Some(floor) = filter.floor {
            query.push(" AND r.floor = ").push_bind(floor);
        }
        if let Some(lifecycle) = filter.lifecycle {
            query.push(" AND r.lifecycle = ").push_bind(lifecycle);
        }
        query.push(" ORDER BY r.floor, r.room_number");

        let rooms = query.build_query_as::<RoomDBResponse>().fetch_all(&mut *self.db).await?;
        Ok(rooms)
    }

    /// Soft delete
    #[instrument(skip(self), fields(room_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("UPDATE rooms SET lifecycle = 'INACTIVE', updated_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(room_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let updated = sqlx::query(
            r#"
            UPDATE rooms SET
                room_number = COALESCE($2, room_number),
                floor = COALESCE($3, floor),
                total_beds = COALESCE($4, total_beds),
                room_type = COALESCE($5, room_type),
                rent_per_bed = COALESCE($6, rent_per_bed),
                has_ac = COALESCE($7, has_ac),
                has_washroom = COALESCE($8, has_washroom),
                status = COALESCE($9, status),
                lifecycle = COALESCE($10, lifecycle),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&request.room_number)
        .bind(request.floor)
        .bind(request.total_beds)
        .bind(request.room_type)
        .bind(request.rent_per_bed)
        .bind(request.has_ac)
        .bind(request.has_washroom)
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
