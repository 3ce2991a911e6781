//! Database repository for dashboard snapshots.

use crate::db::{
    errors::Result,
    models::dashboard::{
        AssignmentStats, BedStats, BillingStats, DashboardDBResponse, DashboardStats, MemberStats, MessStats, RoleCount,
        RoomStats, UserStats, VisitorStats,
    },
};
use chrono::{Datelike, NaiveDate};
use sqlx::{PgConnection, types::Json};
use tracing::instrument;

pub struct Dashboard<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Dashboard<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Count everything afresh for `today`. Month figures cover the calendar month containing it.
    #[instrument(skip(self), err)]
    pub async fn compute_stats(&mut self, today: NaiveDate) -> Result<DashboardStats> {
        let month_start = today.with_day(1).unwrap_or(today);

        let (total, active): (i64, i64) =
            sqlx::query_as("SELECT COUNT(*), COUNT(*) FILTER (WHERE lifecycle = 'ACTIVE') FROM users")
                .fetch_one(&mut *self.db)
                .await?;
        let by_role = sqlx::query_as::<_, RoleCount>(
            r#"
            SELECT r.name AS role, COUNT(*) AS count
            FROM users u
            JOIN roles r ON r.id = u.role_id
            GROUP BY r.name
            ORDER BY r.name
            "#,
        )
        .fetch_all(&mut *self.db)
        .await?;
        let users = UserStats { total, active, by_role };

        let members = sqlx::query_as::<_, MemberStats>(
            r#"
            SELECT COUNT(*) AS total,
                   COUNT(*) FILTER (WHERE status = 'ACTIVE') AS active,
                   COUNT(*) FILTER (WHERE status = 'ON_LEAVE') AS on_leave,
                   COUNT(*) FILTER (WHERE status = 'LEFT') AS "left"
            FROM members
            WHERE lifecycle = 'ACTIVE'
            "#,
        )
        .fetch_one(&mut *self.db)
        .await?;

        let rooms = sqlx::query_as::<_, RoomStats>(
            r#"
            SELECT COUNT(*) AS total_rooms,
                   COUNT(*) FILTER (WHERE status = 'AVAILABLE') AS available_rooms,
                   COUNT(*) FILTER (WHERE status = 'FULL') AS full_rooms,
                   COUNT(*) FILTER (WHERE status = 'MAINTENANCE') AS maintenance_rooms
            FROM rooms
            WHERE lifecycle = 'ACTIVE'
            "#,
        )
        .fetch_one(&mut *self.db)
        .await?;

        let beds = sqlx::query_as::<_, BedStats>(
            r#"
            SELECT COUNT(*) AS total_beds,
                   COUNT(*) FILTER (WHERE status = 'OCCUPIED') AS occupied_beds,
                   COUNT(*) FILTER (WHERE status = 'AVAILABLE') AS available_beds
            FROM beds
            WHERE lifecycle = 'ACTIVE'
            "#,
        )
        .fetch_one(&mut *self.db)
        .await?;

        let bed_assignments = sqlx::query_as::<_, AssignmentStats>(
            r#"
            SELECT COUNT(*) FILTER (WHERE status = 'ACTIVE') AS active,
                   COUNT(*) FILTER (WHERE status = 'CLOSED') AS closed
            FROM bed_assignments
            "#,
        )
        .fetch_one(&mut *self.db)
        .await?;

        let mess = sqlx::query_as::<_, MessStats>(
            r#"
            SELECT COUNT(*) FILTER (WHERE order_date = $1) AS today_orders,
                   COALESCE(SUM(total_amount) FILTER (WHERE order_date = $1), 0) AS today_revenue,
                   COALESCE(SUM(total_amount) FILTER (WHERE order_date >= $2 AND order_date <= $1), 0) AS month_revenue
            FROM food_orders
            WHERE lifecycle = 'ACTIVE'
            "#,
        )
        .bind(today)
        .bind(month_start)
        .fetch_one(&mut *self.db)
        .await?;

        let billing = sqlx::query_as::<_, BillingStats>(
            r#"
            SELECT COUNT(*) AS total_bills,
                   COUNT(*) FILTER (WHERE status = 'UNPAID') AS unpaid_bills,
                   COUNT(*) FILTER (WHERE status = 'PARTIAL') AS partial_bills,
                   COUNT(*) FILTER (WHERE status = 'PAID') AS paid_bills,
                   COALESCE(SUM(paid_amount), 0) AS total_revenue,
                   COALESCE(SUM(due_amount), 0) AS total_due
            FROM bills
            "#,
        )
        .fetch_one(&mut *self.db)
        .await?;

        let visitors = sqlx::query_as::<_, VisitorStats>(
            r#"
            SELECT COUNT(*) FILTER (WHERE in_time::date = $1) AS today_visitors,
                   COUNT(*) FILTER (WHERE status = 'IN') AS currently_inside
            FROM visitors
            "#,
        )
        .bind(today)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(DashboardStats {
            users,
            members,
            rooms,
            beds,
            bed_assignments,
            mess,
            billing,
            visitors,
        })
    }

    /// Overwrite the snapshot for `date`.
    #[instrument(skip(self, stats), err)]
    pub async fn upsert(&mut self, date: NaiveDate, stats: &DashboardStats) -> Result<DashboardDBResponse> {
        let snapshot = sqlx::query_as::<_, DashboardDBResponse>(
            r#"
            INSERT INTO dashboard_stats (date, stats)
            VALUES ($1, $2)
            ON CONFLICT (date) DO UPDATE SET stats = EXCLUDED.stats, last_updated_at = NOW()
            RETURNING id, date, stats, last_updated_at, created_at
            "#,
        )
        .bind(date)
        .bind(Json(stats))
        .fetch_one(&mut *self.db)
        .await?;

        Ok(snapshot)
    }

    #[instrument(skip(self), err)]
    pub async fn get_for_date(&mut self, date: NaiveDate) -> Result<Option<DashboardDBResponse>> {
        let snapshot = sqlx::query_as::<_, DashboardDBResponse>(
            "SELECT id, date, stats, last_updated_at, created_at FROM dashboard_stats WHERE date = $1",
        )
        .bind(date)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::handlers::{Members, Repository};
    use crate::db::models::members::MemberCreateDBRequest;
    use rust_decimal::Decimal;
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_empty_store_counts_zero(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let today = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();

        let stats = Dashboard::new(&mut conn).compute_stats(today).await.unwrap();
        assert_eq!(stats, DashboardStats::default());
        assert_eq!(stats.billing.total_revenue, Decimal::ZERO);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_refresh_overwrites_same_day(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let today = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();

        let mut repo = Dashboard::new(&mut conn);
        assert!(repo.get_for_date(today).await.unwrap().is_none());
        let empty = repo.compute_stats(today).await.unwrap();
        let first = repo.upsert(today, &empty).await.unwrap();

        Members::new(&mut conn)
            .create(&MemberCreateDBRequest {
                member_code: "M-001".to_string(),
                full_name: "Fahad Mustafa".to_string(),
                cnic: "35202-4444444-4".to_string(),
                phone: "0304-4444444".to_string(),
                guardian_name: "Mustafa Kamal".to_string(),
                guardian_phone: None,
                institute_name: None,
                address: None,
                join_date: None,
                created_by: None,
            })
            .await
            .unwrap();

        let mut repo = Dashboard::new(&mut conn);
        let counted = repo.compute_stats(today).await.unwrap();
        assert_eq!(counted.members.total, 1);
        assert_eq!(counted.members.active, 1);

        let second = repo.upsert(today, &counted).await.unwrap();
        assert_eq!(first.id, second.id);
        let stored = repo.get_for_date(today).await.unwrap().unwrap();
        assert_eq!(stored.stats.0.members.total, 1);
    }
}
