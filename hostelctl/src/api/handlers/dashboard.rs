use crate::{
    AppState,
    api::models::{dashboard::DashboardResponse, response::ApiResponse},
    auth::permissions::{RequiresPermission, require},
    db::handlers::Dashboard,
    errors::{Error, Result},
};
use axum::{Json, extract::State};
use chrono::Utc;
use tracing::info;

/// Recompute today's snapshot and store it, replacing any earlier one for the day.
#[utoipa::path(
    post,
    path = "/dashboard/refresh",
    tag = "dashboard",
    summary = "Refresh dashboard",
    responses(
        (status = 200, description = "Fresh snapshot", body = ApiResponse<DashboardResponse>),
        (status = 403, description = "Missing REFRESH_DASHBOARD"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn refresh_stats(
    State(state): State<AppState>,
    _: RequiresPermission<require::RefreshDashboard>,
) -> Result<Json<ApiResponse<DashboardResponse>>> {
    let today = Utc::now().date_naive();

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut dashboard = Dashboard::new(&mut conn);
    let stats = dashboard.compute_stats(today).await?;
    let snapshot = dashboard.upsert(today, &stats).await?;

    info!(date = %today, "dashboard refreshed");

    Ok(Json(ApiResponse::with_message(
        "Dashboard stats refreshed successfully",
        DashboardResponse::from(snapshot),
    )))
}

/// Today's stored snapshot. Nothing is computed here.
#[utoipa::path(
    get,
    path = "/dashboard/stats",
    tag = "dashboard",
    summary = "Get dashboard stats",
    responses(
        (status = 200, description = "Today's snapshot", body = ApiResponse<DashboardResponse>),
        (status = 404, description = "Dashboard stats not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_stats(
    State(state): State<AppState>,
    _: RequiresPermission<require::ViewDashboard>,
) -> Result<Json<ApiResponse<DashboardResponse>>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let snapshot = Dashboard::new(&mut conn)
        .get_for_date(Utc::now().date_naive())
        .await?
        .ok_or_else(|| Error::not_found("Dashboard stats", ""))?;

    Ok(Json(ApiResponse::data(DashboardResponse::from(snapshot))))
}

#[cfg(test)]
mod tests {
    use crate::{
        api::models::{dashboard::DashboardResponse, response::ApiResponse},
        test_utils::*,
        types::PermissionKey,
    };
    use axum::http::StatusCode;
    use serde_json::json;
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_stats_missing_until_refreshed(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let admin = create_test_admin(&pool).await;
        let (name, value) = auth_header(&admin);

        let response = app.get("/api/dashboard/stats").add_header(name.clone(), value.clone()).await;
        response.assert_status(StatusCode::NOT_FOUND);
        let body: serde_json::Value = response.json();
        assert_eq!(body["message"], "Dashboard stats not found");

        let room = create_test_room(&pool, "R1", 1, 3000).await;
        let bed = create_test_bed(&pool, room.id, "B1").await;
        let member = create_test_member(&pool, "M1").await;
        app.post("/api/bed-assignments")
            .add_header(name.clone(), value.clone())
            .json(&json!({"memberId": member.id, "bedId": bed.id}))
            .await
            .assert_status(StatusCode::CREATED);

        let refreshed = app
            .post("/api/dashboard/refresh")
            .add_header(name.clone(), value.clone())
            .await
            .json::<ApiResponse<DashboardResponse>>()
            .data
            .unwrap();
        assert_eq!(refreshed.stats.rooms.total_rooms, 1);
        assert_eq!(refreshed.stats.rooms.full_rooms, 1);
        assert_eq!(refreshed.stats.beds.occupied_beds, 1);
        assert_eq!(refreshed.stats.bed_assignments.active, 1);

        let stored = app
            .get("/api/dashboard/stats")
            .add_header(name, value)
            .await
            .json::<ApiResponse<DashboardResponse>>()
            .data
            .unwrap();
        assert_eq!(stored.date, refreshed.date);
        assert_eq!(stored.stats.members.active, 1);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_view_does_not_grant_refresh(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let viewer = create_test_user(&pool, &[PermissionKey::ViewDashboard]).await;
        let (name, value) = auth_header(&viewer);

        app.post("/api/dashboard/refresh")
            .add_header(name, value)
            .await
            .assert_status(StatusCode::FORBIDDEN);
    }
}
