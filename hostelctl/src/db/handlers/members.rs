//! Database repository for members.

use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::members::{MemberCreateDBRequest, MemberDBResponse, MemberStatus, MemberUpdateDBRequest},
};
use crate::types::{BedId, Lifecycle, MemberId, RoomId, abbrev_uuid};
use sqlx::{PgConnection, QueryBuilder};
use std::collections::HashMap;
use tracing::instrument;

const SELECT_MEMBERS: &str = r#"
    SELECT id, member_code, full_name, cnic, phone, guardian_name, guardian_phone, institute_name, address,
           join_date, leave_date, status, current_bed_id, current_room_id, created_by, lifecycle, created_at, updated_at
    FROM members
"#;

/// Filter for listing members
#[derive(Debug, Clone, Default)]
pub struct MemberFilter {
    pub status: Option<MemberStatus>,
    pub lifecycle: Option<Lifecycle>,
}

pub struct Members<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Members<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self), fields(member_id = %abbrev_uuid(&id)), err)]
    pub async fn lock(&mut self, id: MemberId) -> Result<Option<MemberDBResponse>> {
        let member = sqlx::query_as::<_, MemberDBResponse>(&format!("{SELECT_MEMBERS} WHERE id = $1 FOR UPDATE"))
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(member)
    }

    /// Point a member at a bed (or clear the pointer) and move them to `status`.
    #[instrument(skip(self), fields(member_id = %abbrev_uuid(&id), status = ?status), err)]
    pub async fn set_placement(
        &mut self,
        id: MemberId,
        bed_id: Option<BedId>,
        room_id: Option<RoomId>,
        status: MemberStatus,
    ) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE members SET current_bed_id = $2, current_room_id = $3, status = $4, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(bed_id)
        .bind(room_id)
        .bind(status)
        .execute(&mut *self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }

    /// Change the residency status. Moving to `LEFT` stamps today's leave date; moving back clears it.
    #[instrument(skip(self), fields(member_id = %abbrev_uuid(&id), status = ?status), err)]
    pub async fn set_status(&mut self, id: MemberId, status: MemberStatus) -> Result<MemberDBResponse> {
        let member = sqlx::query_as::<_, MemberDBResponse>(
            r#"
            UPDATE members SET
                status = $2,
                leave_date = CASE WHEN $2 = 'LEFT' THEN COALESCE(leave_date, CURRENT_DATE) ELSE NULL END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, member_code, full_name, cnic, phone, guardian_name, guardian_phone, institute_name, address,
                      join_date, leave_date, status, current_bed_id, current_room_id, created_by, lifecycle, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(status)
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        Ok(member)
    }
}

#[async_trait::async_trait]
impl<'c> Repository for Members<'c> {
    type CreateRequest = MemberCreateDBRequest;
    type UpdateRequest = MemberUpdateDBRequest;
    type Response = MemberDBResponse;
    type Id = MemberId;
    type Filter = MemberFilter;

    #[instrument(skip(self, request), fields(member_code = %request.member_code), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let member = sqlx::query_as::<_, MemberDBResponse>(
            r#"
            INSERT INTO members (member_code, full_name, cnic, phone, guardian_name, guardian_phone,
                                 institute_name, address, join_date, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, COALESCE($9, CURRENT_DATE), $10)
            RETURNING id, member_code, full_name, cnic, phone, guardian_name, guardian_phone, institute_name, address,
                      join_date, leave_date, status, current_bed_id, current_room_id, created_by, lifecycle, created_at, updated_at
            "#,
        )
        .bind(&request.member_code)
        .bind(&request.full_name)
        .bind(&request.cnic)
        .bind(&request.phone)
        .bind(&request.guardian_name)
        .bind(&request.guardian_phone)
        .bind(&request.institute_name)
        .bind(&request.address)
        .bind(request.join_date)
        .bind(request.created_by)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(member)
    }

    #[instrument(skip(self), fields(member_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let member = sqlx::query_as::<_, MemberDBResponse>(&format!("{SELECT_MEMBERS} WHERE id = $1"))
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(member)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<Self::Id>) -> Result<HashMap<Self::Id, Self::Response>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let members = sqlx::query_as::<_, MemberDBResponse>(&format!("{SELECT_MEMBERS} WHERE id = ANY($1)"))
            .bind(&ids)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(members.into_iter().map(|m| (m.id, m)).collect())
    }

    #[instrument(skip(self, filter), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let mut query = QueryBuilder::new(SELECT_MEMBERS);
        query.push(" WHERE TRUE");
        if let Some(status) = filter.status {
            query.push(" AND status = ").push_bind(status);
        }
        if let Some(lifecycle) = filter.lifecycle {
            query.push(" AND lifecycle = ").push_bind(lifecycle);
        }
        query.push(" ORDER BY created_at DESC");

        let members = query.build_query_as::<MemberDBResponse>().fetch_all(&mut *self.db).await?;
        Ok(members)
    }

    /// Soft delete
    #[instrument(skip(self), fields(member_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("UPDATE members SET lifecycle = 'INACTIVE', updated_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(member_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let member = sqlx::query_as::<_, MemberDBResponse>(
            r#"
            UPDATE members SET
                full_name = COALESCE($2, full_name),
                phone = COALESCE($3, phone),
                guardian_name = COALESCE($4, guardian_name),
                guardian_phone = COALESCE($5, guardian_phone),
                institute_name = COALESCE($6, institute_name),
                address = COALESCE($7, address),
                join_date = COALESCE($8, join_date),
                lifecycle = COALESCE($9, lifecycle),
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, member_code, full_name, cnic, phone, guardian_name, guardian_phone, institute_name, address,
                      join_date, leave_date, status, current_bed_id, current_room_id, created_by, lifecycle, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(&request.full_name)
        .bind(&request.phone)
        .bind(&request.guardian_name)
        .bind(&request.guardian_phone)
        .bind(&request.institute_name)
        .bind(&request.address)
        .bind(request.join_date)
        .bind(request.lifecycle)
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        Ok(member)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use sqlx::PgPool;

    fn member(code: &str, cnic: &str) -> MemberCreateDBRequest {
        MemberCreateDBRequest {
            member_code: code.to_string(),
            full_name: "Bilal Ahmed".to_string(),
            cnic: cnic.to_string(),
            phone: "0300-0000000".to_string(),
            guardian_name: "Ahmed Raza".to_string(),
            guardian_phone: None,
            institute_name: Some("FAST".to_string()),
            address: None,
            join_date: None,
            created_by: None,
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_defaults_join_date_and_status(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Members::new(&mut conn);

        let created = repo.create(&member("M-001", "35202-1111111-1")).await.unwrap();
        assert_eq!(created.status, MemberStatus::Active);
        assert!(created.current_bed_id.is_none());

        let dated = repo
            .create(&MemberCreateDBRequest {
                join_date: NaiveDate::from_ymd_opt(2025, 9, 1),
                ..member("M-002", "35202-2222222-2")
            })
            .await
            .unwrap();
        assert_eq!(dated.join_date, NaiveDate::from_ymd_opt(2025, 9, 1).unwrap());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_code_and_cnic_are_unique(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Members::new(&mut conn);

        repo.create(&member("M-001", "35202-1111111-1")).await.unwrap();
        let err = repo.create(&member("M-001", "35202-9999999-9")).await.unwrap_err();
        assert_eq!(err.constraint(), Some("members_member_code_unique"));
        let err = repo.create(&member("M-002", "35202-1111111-1")).await.unwrap_err();
        assert_eq!(err.constraint(), Some("members_cnic_unique"));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_left_stamps_leave_date(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Members::new(&mut conn);
        let created = repo.create(&member("M-001", "35202-1111111-1")).await.unwrap();

        let left = repo.set_status(created.id, MemberStatus::Left).await.unwrap();
        assert_eq!(left.status, MemberStatus::Left);
        assert!(left.leave_date.is_some());

        let back = repo.set_status(created.id, MemberStatus::Active).await.unwrap();
        assert!(back.leave_date.is_none());
    }
}
