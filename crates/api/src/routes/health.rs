use axum::{
    Json,
    extract::{Query, State},
};
use serde::Deserialize;

use bailbook_services::health::{CoverageReport, HealthReport, LightReport};

use crate::state::AppState;

/// Liveness only; never touches the datastore.
pub async fn light(State(state): State<AppState>) -> Json<LightReport> {
    Json(state.health.light())
}

/// Always 200; problems are reported in the body.
pub async fn full(State(state): State<AppState>) -> Json<HealthReport> {
    Json(state.health.full().await)
}

#[derive(Debug, Deserialize)]
pub struct FieldsQuery {
    pub sample: Option<String>,
}

pub async fn fields(
    State(state): State<AppState>,
    Query(q): Query<FieldsQuery>,
) -> Json<CoverageReport> {
    let sample = q.sample.as_deref().and_then(|s| s.trim().parse().ok());
    Json(state.health.fields(sample).await)
}
