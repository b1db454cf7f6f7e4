use axum::{
    Json,
    extract::{Query, State},
};
use serde::Deserialize;

use bailbook_services::auth::permissions::VIEW_CASES;
use bailbook_services::dashboard::{KpiReport, ListReport, PerCountyReport, TrendReport};
use bailbook_services::windows::Window;

use crate::{error::ApiError, extractors::auth::AuthUser, state::AppState};

/// Raw query parameters. Values that do not parse fall back to defaults
/// instead of rejecting the request.
#[derive(Debug, Default, Deserialize)]
pub struct DashboardQuery {
    pub window: Option<String>,
    pub limit: Option<String>,
    pub days: Option<String>,
}

impl DashboardQuery {
    fn window(&self) -> Window {
        Window::parse(self.window.as_deref())
    }

    fn limit(&self) -> Option<i64> {
        self.limit.as_deref().and_then(|l| l.trim().parse().ok())
    }

    fn days(&self) -> Option<i64> {
        self.days.as_deref().and_then(|d| d.trim().parse().ok())
    }
}

pub async fn kpis(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<KpiReport>, ApiError> {
    auth.require(VIEW_CASES)?;
    Ok(Json(state.dashboard.kpis().await?))
}

pub async fn trends(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(q): Query<DashboardQuery>,
) -> Result<Json<TrendReport>, ApiError> {
    auth.require(VIEW_CASES)?;
    Ok(Json(state.dashboard.trends(q.days()).await?))
}

pub async fn per_county(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(q): Query<DashboardQuery>,
) -> Result<Json<PerCountyReport>, ApiError> {
    auth.require(VIEW_CASES)?;
    Ok(Json(state.dashboard.per_county(q.window()).await?))
}

pub async fn new_bookings(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(q): Query<DashboardQuery>,
) -> Result<Json<ListReport>, ApiError> {
    auth.require(VIEW_CASES)?;
    Ok(Json(state.dashboard.new_bookings(q.window(), q.limit()).await?))
}

pub async fn recent(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(q): Query<DashboardQuery>,
) -> Result<Json<ListReport>, ApiError> {
    auth.require(VIEW_CASES)?;
    Ok(Json(state.dashboard.recent(q.limit()).await?))
}

pub async fn top(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(q): Query<DashboardQuery>,
) -> Result<Json<ListReport>, ApiError> {
    auth.require(VIEW_CASES)?;
    Ok(Json(state.dashboard.top(q.window(), q.limit()).await?))
}
