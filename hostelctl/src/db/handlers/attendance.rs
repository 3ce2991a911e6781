//! Database repository for attendance marks.
//!
//! Marks are keyed by (member, date); writing the same pair again overwrites the earlier mark.

use crate::db::{
    errors::Result,
    models::attendance::{AttendanceDBResponse, AttendanceSheetRow, AttendanceUpsertDBRequest},
};
use crate::types::{AttendanceId, MemberId, RoomId, abbrev_uuid};
use chrono::NaiveDate;
use sqlx::PgConnection;
use tracing::instrument;

const SELECT_ATTENDANCE: &str = r#"
    SELECT a.id, a.member_id, m.full_name AS member_name, a.room_id, a.bed_id, a.date, a.status, a.remarks,
           a.marked_by, a.lifecycle, a.created_at, a.updated_at
    FROM attendance a
    JOIN members m ON m.id = a.member_id
"#;

pub struct Attendance<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Attendance<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Insert or overwrite the mark for (member, date). A soft-deleted mark is revived.
    #[instrument(skip(self, request), fields(member_id = %abbrev_uuid(&request.member_id), date = %request.date), err)]
    pub async fn upsert(&mut self, request: &AttendanceUpsertDBRequest) -> Result<AttendanceId> {
        let id: AttendanceId = sqlx::query_scalar(
            r#"
            INSERT INTO attendance (member_id, room_id, bed_id, date, status, remarks, marked_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (member_id, date) DO UPDATE SET
                room_id = EXCLUDED.room_id,
                bed_id = EXCLUDED.bed_id,
                status = EXCLUDED.status,
                remarks = EXCLUDED.remarks,
                marked_by = EXCLUDED.marked_by,
                lifecycle = 'ACTIVE',
                updated_at = NOW()
            RETURNING id
            "#,
        )
        .bind(request.member_id)
        .bind(request.room_id)
        .bind(request.bed_id)
        .bind(request.date)
        .bind(request.status)
        .bind(&request.remarks)
        .bind(request.marked_by)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(id)
    }

    #[instrument(skip(self), fields(attendance_id = %abbrev_uuid(&id)), err)]
    pub async fn get_by_id(&mut self, id: AttendanceId) -> Result<Option<AttendanceDBResponse>> {
        let record = sqlx::query_as::<_, AttendanceDBResponse>(&format!("{SELECT_ATTENDANCE} WHERE a.id = $1"))
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(record)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    pub async fn get_many(&mut self, ids: &[AttendanceId]) -> Result<Vec<AttendanceDBResponse>> {
        let records = sqlx::query_as::<_, AttendanceDBResponse>(&format!(
            "{SELECT_ATTENDANCE} WHERE a.id = ANY($1) ORDER BY m.full_name"
        ))
        .bind(ids)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(records)
    }

    /// Every member with an active assignment, with the day's mark or a `PRESENT` default.
    #[instrument(skip(self), err)]
    pub async fn sheet(&mut self, date: NaiveDate) -> Result<Vec<AttendanceSheetRow>> {
        let rows = sqlx::query_as::<_, AttendanceSheetRow>(
            r#"
            SELECT ba.member_id, m.full_name AS member_name, m.member_code,
                   ba.room_id, r.room_number, ba.bed_id, b.bed_number,
                   att.id AS attendance_id,
                   COALESCE(att.status, 'PRESENT') AS status,
                   att.remarks,
                   att.id IS NOT NULL AS marked
            FROM bed_assignments ba
            JOIN members m ON m.id = ba.member_id
            JOIN rooms r ON r.id = ba.room_id
            JOIN beds b ON b.id = ba.bed_id
            LEFT JOIN attendance att
                ON att.member_id = ba.member_id AND att.date = $1 AND att.lifecycle = 'ACTIVE'
            WHERE ba.status = 'ACTIVE'
            ORDER BY r.room_number, b.bed_number
            "#,
        )
        .bind(date)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(rows)
    }

    /// A member's active marks, newest date first.
    #[instrument(skip(self), fields(member_id = %abbrev_uuid(&member_id)), err)]
    pub async fn for_member(&mut self, member_id: MemberId) -> Result<Vec<AttendanceDBResponse>> {
        let records = sqlx::query_as::<_, AttendanceDBResponse>(&format!(
            "{SELECT_ATTENDANCE} WHERE a.member_id = $1 AND a.lifecycle = 'ACTIVE' ORDER BY a.date DESC"
        ))
        .bind(member_id)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(records)
    }

    #[instrument(skip(self), fields(room_id = %abbrev_uuid(&room_id)), err)]
    pub async fn for_room(&mut self, room_id: RoomId, date: NaiveDate) -> Result<Vec<AttendanceDBResponse>> {
        let records = sqlx::query_as::<_, AttendanceDBResponse>(&format!(
            "{SELECT_ATTENDANCE} WHERE a.room_id = $1 AND a.date = $2 AND a.lifecycle = 'ACTIVE' ORDER BY m.full_name"
        ))
        .bind(room_id)
        .bind(date)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(records)
    }

    /// Soft delete
    #[instrument(skip(self), fields(attendance_id = %abbrev_uuid(&id)), err)]
    pub async fn delete(&mut self, id: AttendanceId) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE attendance SET lifecycle = 'INACTIVE', updated_at = NOW() WHERE id = $1 AND lifecycle = 'ACTIVE'",
        )
        .bind(id)
        .execute(&mut *self.db)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::handlers::{Members, Repository};
    use crate::db::models::{attendance::AttendanceStatus, members::MemberCreateDBRequest};
    use sqlx::PgPool;

    async fn member(conn: &mut PgConnection) -> MemberId {
        Members::new(conn)
            .create(&MemberCreateDBRequest {
                member_code: "M-001".to_string(),
                full_name: "Saad Iqbal".to_string(),
                cnic: "35202-5555555-5".to_string(),
                phone: "0302-5555555".to_string(),
                guardian_name: "Iqbal Hussain".to_string(),
                guardian_phone: None,
                institute_name: None,
                address: None,
                join_date: None,
                created_by: None,
            })
            .await
            .unwrap()
            .id
    }

    fn mark(member_id: MemberId, date: NaiveDate, status: AttendanceStatus, remarks: &str) -> AttendanceUpsertDBRequest {
        AttendanceUpsertDBRequest {
            member_id,
            room_id: None,
            bed_id: None,
            date,
            status,
            remarks: Some(remarks.to_string()),
            marked_by: None,
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_upsert_is_idempotent_and_last_write_wins(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let member_id = member(&mut conn).await;
        let date = NaiveDate::from_ymd_opt(2026, 10, 1).unwrap();

        let mut repo = Attendance::new(&mut conn);
        let first = repo
            .upsert(&mark(member_id, date, AttendanceStatus::Absent, "sick"))
            .await
            .unwrap();
        let second = repo
            .upsert(&mark(member_id, date, AttendanceStatus::Leave, "went home"))
            .await
            .unwrap();
        assert_eq!(first, second);

        let records = repo.for_member(member_id).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, AttendanceStatus::Leave);
        assert_eq!(records[0].remarks.as_deref(), Some("went home"));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_soft_delete_then_remark_revives(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let member_id = member(&mut conn).await;
        let date = NaiveDate::from_ymd_opt(2026, 10, 2).unwrap();

        let mut repo = Attendance::new(&mut conn);
        let id = repo
            .upsert(&mark(member_id, date, AttendanceStatus::Present, "ok"))
            .await
            .unwrap();
        assert!(repo.delete(id).await.unwrap());
        assert!(!repo.delete(id).await.unwrap());
        assert!(repo.for_member(member_id).await.unwrap().is_empty());

        repo.upsert(&mark(member_id, date, AttendanceStatus::Absent, "again"))
            .await
            .unwrap();
        assert_eq!(repo.for_member(member_id).await.unwrap().len(), 1);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_sheet_is_empty_without_assignments(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        member(&mut conn).await;

        let sheet = Attendance::new(&mut conn)
            .sheet(NaiveDate::from_ymd_opt(2026, 10, 3).unwrap())
            .await
            .unwrap();
        assert!(sheet.is_empty());
    }
}
