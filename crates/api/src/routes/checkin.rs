use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use bson::DateTime;
use chrono::{DateTime as ChronoDateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use bailbook_db::models::{CheckIn, CheckInPing, CheckInStatus};
use bailbook_services::auth::permissions::{MANAGE_CHECKINS, VIEW_CASES};
use bailbook_services::dao::checkin::PingReport;

use super::case::locate;
use crate::{
    error::{ApiError, parse_id},
    extractors::auth::AuthUser,
    state::AppState,
};

#[derive(Debug, Serialize)]
pub struct CheckInResponse {
    pub id: String,
    pub case_id: String,
    pub county: String,
    pub due_at: String,
    pub status: CheckInStatus,
    pub note: Option<String>,
    pub completed_at: Option<String>,
    pub created_by: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Serialize)]
pub struct PingResponse {
    pub id: String,
    pub checkin_id: String,
    pub lat: f64,
    pub lng: f64,
    pub accuracy_m: Option<f64>,
    pub received_at: String,
}

fn iso(at: DateTime) -> String {
    at.try_to_rfc3339_string().unwrap_or_default()
}

fn to_response(c: CheckIn) -> CheckInResponse {
    CheckInResponse {
        id: c.id.map(|id| id.to_hex()).unwrap_or_default(),
        case_id: c.case_id.to_hex(),
        county: c.county,
        due_at: iso(c.due_at),
        status: c.status,
        note: c.note,
        completed_at: c.completed_at.map(iso),
        created_by: c.created_by,
        created_at: iso(c.created_at),
    }
}

fn ping_response(p: CheckInPing) -> PingResponse {
    PingResponse {
        id: p.id.map(|id| id.to_hex()).unwrap_or_default(),
        checkin_id: p.checkin_id.to_hex(),
        lat: p.lat,
        lng: p.lng,
        accuracy_m: p.accuracy_m,
        received_at: iso(p.received_at),
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCheckInRequest {
    pub due_at: String,
    #[validate(length(max = 1000))]
    pub note: Option<String>,
}

pub async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(case_id): Path<String>,
    Json(body): Json<CreateCheckInRequest>,
) -> Result<(StatusCode, Json<CheckInResponse>), ApiError> {
    auth.require(MANAGE_CHECKINS)?;
    body.validate()?;
    let due_at = ChronoDateTime::parse_from_rfc3339(&body.due_at)
        .map_err(|_| ApiError::Validation("due_at must be an RFC 3339 timestamp".to_string()))?
        .with_timezone(&Utc);

    let at = locate(&state, &auth, &case_id).await?;
    let checkin = state
        .store()?
        .checkins
        .create(
            at.id()?,
            at.county,
            DateTime::from_chrono(due_at),
            body.note,
            auth.uid(),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(to_response(checkin))))
}

pub async fn list(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(case_id): Path<String>,
) -> Result<Json<Vec<CheckInResponse>>, ApiError> {
    auth.require(VIEW_CASES)?;
    let at = locate(&state, &auth, &case_id).await?;
    let items = state.store()?.checkins.for_case(at.id()?).await?;
    Ok(Json(items.into_iter().map(to_response).collect()))
}

/// Loads a check-in and confirms its case is visible to the caller.
async fn scoped_checkin(
    state: &AppState,
    auth: &AuthUser,
    checkin_id: &str,
) -> Result<CheckIn, ApiError> {
    let id = parse_id(checkin_id, "check-in id")?;
    let checkin = state.store()?.checkins.find(id).await?;
    locate(state, auth, &checkin.case_id.to_hex()).await?;
    Ok(checkin)
}

pub async fn complete(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(checkin_id): Path<String>,
) -> Result<Json<CheckInResponse>, ApiError> {
    auth.require(MANAGE_CHECKINS)?;
    let checkin = scoped_checkin(&state, &auth, &checkin_id).await?;
    let id = checkin.id.ok_or_else(|| ApiError::NotFound("Check-in not found".to_string()))?;
    let done = state.store()?.checkins.complete(id, state.now()).await?;
    Ok(Json(to_response(done)))
}

#[derive(Debug, Deserialize, Validate)]
pub struct PingRequest {
    #[validate(range(min = -90.0, max = 90.0))]
    pub lat: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub lng: f64,
    #[validate(range(min = 0.0))]
    pub accuracy_m: Option<f64>,
}

pub async fn ping(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(checkin_id): Path<String>,
    Json(body): Json<PingRequest>,
) -> Result<(StatusCode, Json<PingResponse>), ApiError> {
    auth.require(MANAGE_CHECKINS)?;
    body.validate()?;
    let checkin = scoped_checkin(&state, &auth, &checkin_id).await?;

    let ping = state
        .store()?
        .checkins
        .record_ping(
            &checkin,
            PingReport {
                lat: body.lat,
                lng: body.lng,
                accuracy_m: body.accuracy_m,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(ping_response(ping))))
}
