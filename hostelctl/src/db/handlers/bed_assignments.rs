//! Database repository for bed assignments.
//!
//! An assignment binds one member to one bed. Postgres keeps at most one `ACTIVE` assignment per
//! member and per bed through partial unique indexes, so a concurrent double-assign fails on insert
//! even if both callers passed the availability checks.
//!
//! Callers that transition an assignment lock the member row first, then the assignment, then the
//! bed and its room. [`release_placement`] expects the first two held and writes the bed and room in
//! that order.

use crate::db::{
    errors::{DbError, Result},
    handlers::{Beds, Members, Rooms, repository::Repository},
    models::{
        bed_assignments::{AssignmentStatus, BedAssignmentCreateDBRequest, BedAssignmentDBResponse, BedAssignmentUpdateDBRequest},
        beds::BedStatus,
        members::MemberStatus,
    },
};
use crate::types::{BedAssignmentId, BedId, MemberId, abbrev_uuid};
use sqlx::{PgConnection, QueryBuilder};
use std::collections::HashMap;
use tracing::instrument;

const SELECT_ASSIGNMENTS: &str = r#"
    SELECT a.id, a.member_id, m.full_name AS member_name, m.member_code, a.bed_id, b.bed_number,
           a.room_id, r.room_number, a.rent_at_assignment, a.status, a.start_date, a.end_date,
           a.billable, a.remarks, a.assigned_by, a.created_at, a.updated_at
    FROM bed_assignments a
    JOIN members m ON m.id = a.member_id
    JOIN beds b ON b.id = a.bed_id
    JOIN rooms r ON r.id = a.room_id
"#;

/// Filter for listing assignments
#[derive(Debug, Clone, Default)]
pub struct BedAssignmentFilter {
    pub status: Option<AssignmentStatus>,
    pub member_id: Option<MemberId>,
    pub bed_id: Option<BedId>,
}

pub struct BedAssignments<'c> {
    db: &'c mut PgConnection,
}

/// Undo the placement side effects of an assignment that has just been closed.
///
/// Frees the bed, re-derives the room status from what is still occupied, and clears the member's
/// bed pointer while moving them to `member_status`. Runs on the caller's transaction.
#[instrument(skip(conn, assignment), fields(assignment_id = %abbrev_uuid(&assignment.id)), err)]
pub async fn release_placement(
    conn: &mut PgConnection,
    assignment: &BedAssignmentDBResponse,
    member_status: MemberStatus,
) -> Result<()> {
    Beds::new(&mut *conn).set_status(assignment.bed_id, BedStatus::Available).await?;
    Rooms::new(&mut *conn).recompute_status(assignment.room_id).await?;
    Members::new(&mut *conn)
        .set_placement(assignment.member_id, None, None, member_status)
        .await?;
    Ok(())
}

impl<'c> BedAssignments<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self), fields(assignment_id = %abbrev_uuid(&id)), err)]
    pub async fn lock(&mut self, id: BedAssignmentId) -> Result<Option<BedAssignmentDBResponse>> {
        let assignment =
            sqlx::query_as::<_, BedAssignmentDBResponse>(&format!("{SELECT_ASSIGNMENTS} WHERE a.id = $1 FOR UPDATE OF a"))
                .bind(id)
                .fetch_optional(&mut *self.db)
                .await?;

        Ok(assignment)
    }

    /// The member's active assignment, locked.
    #[instrument(skip(self), fields(member_id = %abbrev_uuid(&member_id)), err)]
    pub async fn lock_active_for_member(&mut self, member_id: MemberId) -> Result<Option<BedAssignmentDBResponse>> {
        let assignment = sqlx::query_as::<_, BedAssignmentDBResponse>(&format!(
            "{SELECT_ASSIGNMENTS} WHERE a.member_id = $1 AND a.status = 'ACTIVE' FOR UPDATE OF a"
        ))
        .bind(member_id)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(assignment)
    }

    /// The member's active assignment if its rent should be billed.
    #[instrument(skip(self), fields(member_id = %abbrev_uuid(&member_id)), err)]
    pub async fn active_billable_for_member(&mut self, member_id: MemberId) -> Result<Option<BedAssignmentDBResponse>> {
        let assignment = sqlx::query_as::<_, BedAssignmentDBResponse>(&format!(
            "{SELECT_ASSIGNMENTS} WHERE a.member_id = $1 AND a.status = 'ACTIVE' AND a.billable"
        ))
        .bind(member_id)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(assignment)
    }

    /// Move an `ACTIVE` assignment to `CLOSED`, stamping its end date.
    ///
    /// Returns `NotFound` when the assignment does not exist or is already closed.
    #[instrument(skip(self), fields(assignment_id = %abbrev_uuid(&id)), err)]
    pub async fn close(&mut self, id: BedAssignmentId) -> Result<BedAssignmentDBResponse> {
        let result = sqlx::query(
            r#"
            UPDATE bed_assignments SET status = 'CLOSED', end_date = NOW(), updated_at = NOW()
            WHERE id = $1 AND status = 'ACTIVE'
            "#,
        )
        .bind(id)
        .execute(&mut *self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }
        self.get_by_id(id).await?.ok_or(DbError::NotFound)
    }
}

#[async_trait::async_trait]
impl<'c> Repository for BedAssignments<'c> {
    type CreateRequest = BedAssignmentCreateDBRequest;
    type UpdateRequest = BedAssignmentUpdateDBRequest;
    type Response = BedAssignmentDBResponse;
    type Id = BedAssignmentId;
    type Filter = BedAssignmentFilter;

    #[instrument(skip(self, request), fields(member_id = %abbrev_uuid(&request.member_id), bed_id = %abbrev_uuid(&request.bed_id)), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let id: BedAssignmentId = sqlx::query_scalar(
            r#"
            INSERT INTO bed_assignments (member_id, bed_id, room_id, rent_at_assignment, billable, remarks, assigned_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            "#,
        )
        .bind(request.member_id)
        .bind(request.bed_id)
        .bind(request.room_id)
        .bind(request.rent_at_assignment)
        .bind(request.billable)
        .bind(&request.remarks)
        .bind(request.assigned_by)
        .fetch_one(&mut *self.db)
        .await?;

        self.get_by_id(id).await?.ok_or(DbError::NotFound)
    }

    #[instrument(skip(self), fields(assignment_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let assignment = sqlx::query_as::<_, BedAssignmentDBResponse>(&format!("{SELECT_ASSIGNMENTS} WHERE a.id = $1"))
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(assignment)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<Self::Id>) -> Result<HashMap<Self::Id, Self::Response>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let assignments = sqlx::query_as::<_, BedAssignmentDBResponse>(&format!("{SELECT_ASSIGNMENTS} WHERE a.id = ANY($1)"))
            .bind(&ids)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(assignments.into_iter().map(|a| (a.id, a)).collect())
    }

    #[instrument(skip(self, filter), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let mut query = QueryBuilder::new(SELECT_ASSIGNMENTS);
        query.push(" WHERE TRUE");
        if let Some(status) = filter.status {
            query.push(" AND a.status = ").push_bind(status);
        }
        if let Some(member_id) = filter.member_id {
            query.push(" AND a.member_id = ").push_bind(member_id);
        }
        if let Some(bed_id) = filter.bed_id {
            query.push(" AND a.bed_id = ").push_bind(bed_id);
        }
        query.push(" ORDER BY a.created_at DESC");

        let assignments = query
            .build_query_as::<BedAssignmentDBResponse>()
            .fetch_all(&mut *self.db)
            .await?;
        Ok(assignments)
    }

    /// Hard delete
    #[instrument(skip(self), fields(assignment_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM bed_assignments WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(assignment_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let updated = sqlx::query(
            r#"
            UPDATE bed_assignments SET
                remarks = COALESCE($2, remarks),
                billable = COALESCE($3, billable),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&request.remarks)
        .bind(request.billable)
        .execute(&mut *self.db)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }
        self.get_by_id(id).await?.ok_or(DbError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{beds::BedCreateDBRequest, members::MemberCreateDBRequest, rooms::RoomCreateDBRequest};
    use crate::db::models::rooms::{RoomStatus, RoomType};
    use crate::types::RoomId;
    use rust_decimal::Decimal;
    use sqlx::PgPool;

    struct Fixture {
        room_id: RoomId,
        beds: Vec<BedId>,
        members: Vec<MemberId>,
    }

    async fn fixture(conn: &mut PgConnection, total_beds: i32) -> Fixture {
        let room_id = Rooms::new(&mut *conn)
            .create(&RoomCreateDBRequest {
                room_number: "R1".to_string(),
                floor: 1,
                total_beds,
                room_type: RoomType::Double,
                rent_per_bed: Decimal::from(5000),
                has_ac: false,
                has_washroom: false,
                created_by: None,
            })
            .await
            .unwrap()
            .id;

        let mut beds = Vec::new();
        let mut members = Vec::new();
        for i in 0..total_beds {
            let bed = Beds::new(&mut *conn)
                .create(&BedCreateDBRequest {
                    bed_number: format!("B{}", i + 1),
                    room_id,
                    created_by: None,
                })
                .await
                .unwrap();
            beds.push(bed.id);

            let member = Members::new(&mut *conn)
                .create(&MemberCreateDBRequest {
                    member_code: format!("M-{i:03}"),
                    full_name: format!("Member {i}"),
                    cnic: format!("35202-000000{i}-1"),
                    phone: "0300-0000000".to_string(),
                    guardian_name: "Guardian".to_string(),
                    guardian_phone: None,
                    institute_name: None,
                    address: None,
                    join_date: None,
                    created_by: None,
                })
                .await
                .unwrap();
            members.push(member.id);
        }

        Fixture { room_id, beds, members }
    }

    fn assign(f: &Fixture, member: usize, bed: usize) -> BedAssignmentCreateDBRequest {
        BedAssignmentCreateDBRequest {
            member_id: f.members[member],
            bed_id: f.beds[bed],
            room_id: f.room_id,
            rent_at_assignment: Decimal::from(5000),
            billable: true,
            remarks: None,
            assigned_by: None,
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_one_active_assignment_per_member_and_bed(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let f = fixture(&mut conn, 2).await;

        let mut repo = BedAssignments::new(&mut conn);
        let first = repo.create(&assign(&f, 0, 0)).await.unwrap();
        assert_eq!(first.status, AssignmentStatus::Active);
        assert_eq!(first.member_code, "M-000");
        assert_eq!(first.room_number, "R1");

        let err = repo.create(&assign(&f, 0, 1)).await.unwrap_err();
        assert_eq!(err.constraint(), Some("bed_assignments_active_member_unique"));

        let err = repo.create(&assign(&f, 1, 0)).await.unwrap_err();
        assert_eq!(err.constraint(), Some("bed_assignments_active_bed_unique"));

        // Once closed, both the member and the bed are free again
        repo.close(first.id).await.unwrap();
        repo.create(&assign(&f, 1, 0)).await.unwrap();
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_close_twice_is_not_found(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let f = fixture(&mut conn, 1).await;

        let mut repo = BedAssignments::new(&mut conn);
        let created = repo.create(&assign(&f, 0, 0)).await.unwrap();
        let closed = repo.close(created.id).await.unwrap();
        assert_eq!(closed.status, AssignmentStatus::Closed);
        assert!(closed.end_date.is_some());

        assert!(matches!(repo.close(created.id).await, Err(DbError::NotFound)));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_release_placement_frees_bed_and_room(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let f = fixture(&mut conn, 1).await;

        let assignment = BedAssignments::new(&mut conn).create(&assign(&f, 0, 0)).await.unwrap();
        Beds::new(&mut conn).set_status(f.beds[0], BedStatus::Occupied).await.unwrap();
        Members::new(&mut conn)
            .set_placement(f.members[0], Some(f.beds[0]), Some(f.room_id), MemberStatus::Active)
            .await
            .unwrap();
        assert_eq!(Rooms::new(&mut conn).recompute_status(f.room_id).await.unwrap(), RoomStatus::Full);

        let closed = BedAssignments::new(&mut conn).close(assignment.id).await.unwrap();
        release_placement(&mut conn, &closed, MemberStatus::OnLeave).await.unwrap();

        let bed = Beds::new(&mut conn).get_by_id(f.beds[0]).await.unwrap().unwrap();
        assert_eq!(bed.status, BedStatus::Available);
        let room = Rooms::new(&mut conn).get_by_id(f.room_id).await.unwrap().unwrap();
        assert_eq!(room.status, RoomStatus::Available);
        let member = Members::new(&mut conn).get_by_id(f.members[0]).await.unwrap().unwrap();
        assert_eq!(member.status, MemberStatus::OnLeave);
        assert!(member.current_bed_id.is_none());
        assert!(member.current_room_id.is_none());
    }
}
