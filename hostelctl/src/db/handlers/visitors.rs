//! Database repository for the visitor log.

use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::visitors::{VisitorCreateDBRequest, VisitorDBResponse, VisitorStatus, VisitorUpdateDBRequest},
};
use crate::types::{MemberId, VisitorId, abbrev_uuid};
use sqlx::{PgConnection, QueryBuilder};
use std::collections::HashMap;
use tracing::instrument;

const SELECT_VISITORS: &str = r#"
    SELECT v.id, v.visitor_name, v.visitor_phone, v.purpose, v.member_id, m.full_name AS member_name,
           v.in_time, v.out_time, v.status, v.logged_by, v.remarks, v.created_at, v.updated_at
    FROM visitors v
    JOIN members m ON m.id = v.member_id
"#;

/// Filter for listing visitors
#[derive(Debug, Clone, Default)]
pub struct VisitorFilter {
    pub member_id: Option<MemberId>,
    pub status: Option<VisitorStatus>,
}

pub struct Visitors<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Visitors<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }
}

#[async_trait::async_trait]
impl<'c> Repository for Visitors<'c> {
    type CreateRequest = VisitorCreateDBRequest;
    type UpdateRequest = VisitorUpdateDBRequest;
    type Response = VisitorDBResponse;
    type Id = VisitorId;
    type Filter = VisitorFilter;

    #[instrument(skip(self, request), fields(member_id = %abbrev_uuid(&request.member_id)), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let id: VisitorId = sqlx::query_scalar(
            r#"
            INSERT INTO visitors (visitor_name, visitor_phone, purpose, member_id, remarks, logged_by)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(&request.visitor_name)
        .bind(&request.visitor_phone)
        .bind(&request.purpose)
        .bind(request.member_id)
        .bind(&request.remarks)
        .bind(request.logged_by)
        .fetch_one(&mut *self.db)
        .await?;

        self.get_by_id(id).await?.ok_or(DbError::NotFound)
    }

    #[instrument(skip(self), fields(visitor_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let visitor = sqlx::query_as::<_, VisitorDBResponse>(&format!("{SELECT_VISITORS} WHERE v.id = $1"))
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(visitor)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<Self::Id>) -> Result<HashMap<Self::Id, Self::Response>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let visitors = sqlx::query_as::<_, VisitorDBResponse>(&format!("{SELECT_VISITORS} WHERE v.id = ANY($1)"))
            .bind(&ids)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(visitors.into_iter().map(|v| (v.id, v)).collect())
    }

    #[instrument(skip(self, filter), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let mut query = QueryBuilder::new(SELECT_VISITORS);
        query.push(" WHERE TRUE");
        if let Some(member_id) = filter.member_id {
            query.push(" AND v.member_id = ").push_bind(member_id);
        }
        if let Some(status) = filter.status {
            query.push(" AND v.status = ").push_bind(status);
        }
        query.push(" ORDER BY v.in_time DESC");

        let visitors = query.build_query_as::<VisitorDBResponse>().fetch_all(&mut *self.db).await?;
        Ok(visitors)
    }

    /// Hard delete
    #[instrument(skip(self), fields(visitor_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM visitors WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(visitor_id = %abbrev_uuid(&id), check_out = request.check_out), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let updated = sqlx::query(
            r#"
            UPDATE visitors SET
                remarks = COALESCE($2, remarks),
                status = CASE WHEN $3 THEN 'OUT' ELSE status END,
                out_time = CASE WHEN $3 THEN NOW() ELSE out_time END,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&request.remarks)
        .bind(request.check_out)
        .execute(&mut *self.db)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }
        self.get_by_id(id).await?.ok_or(DbError::NotFound)
    }
}
