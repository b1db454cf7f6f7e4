use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use tracing::warn;
use validator::{Validate, ValidationError};

use bailbook_db::models::Message;
use bailbook_services::auth::permissions::{SEND_MESSAGES, VIEW_ALL_DEPARTMENTS, VIEW_CASES};
use bailbook_services::dao::base::PaginationParams;
use bailbook_services::dao::message::NewOutbound;

use super::case::locate;
use crate::{error::ApiError, extractors::auth::AuthUser, state::AppState};

#[derive(Debug, Serialize)]
pub struct StatusChangeResponse {
    pub status: &'static str,
    pub at: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub id: String,
    pub case_id: Option<String>,
    pub county: Option<String>,
    pub direction: &'static str,
    pub to: String,
    pub from: String,
    pub body: String,
    pub status: &'static str,
    pub provider_sid: Option<String>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub status_history: Vec<StatusChangeResponse>,
    pub sent_by: Option<String>,
    pub created_at: String,
}

pub fn to_response(m: Message) -> MessageResponse {
    MessageResponse {
        id: m.id.map(|id| id.to_hex()).unwrap_or_default(),
        case_id: m.case_id.map(|id| id.to_hex()),
        county: m.county,
        direction: match m.direction {
            bailbook_db::models::Direction::Outbound => "outbound",
            bailbook_db::models::Direction::Inbound => "inbound",
        },
        to: m.to,
        from: m.from,
        body: m.body,
        status: m.status.as_str(),
        provider_sid: m.provider_sid,
        error_code: m.error_code,
        error_message: m.error_message,
        status_history: m
            .status_history
            .into_iter()
            .map(|c| StatusChangeResponse {
                status: c.status.as_str(),
                at: c.at.try_to_rfc3339_string().unwrap_or_default(),
            })
            .collect(),
        sent_by: m.sent_by,
        created_at: m.created_at.try_to_rfc3339_string().unwrap_or_default(),
    }
}

/// `+` followed by 8 to 15 digits, first digit non-zero.
fn validate_phone(value: &str) -> Result<(), ValidationError> {
    let digits = value.strip_prefix('+').unwrap_or("");
    let ok = (8..=15).contains(&digits.len())
        && digits.chars().all(|c| c.is_ascii_digit())
        && !digits.starts_with('0');
    if ok {
        Ok(())
    } else {
        Err(ValidationError::new("phone"))
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct SendRequest {
    #[validate(custom(function = "validate_phone"))]
    pub to: String,
    #[validate(length(min = 1, max = 1600))]
    pub body: String,
    pub case_id: Option<String>,
}

pub async fn send(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<SendRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), ApiError> {
    auth.require(SEND_MESSAGES)?;
    req.validate()?;
    let store = state.store()?;

    let (case_id, county) = match req.case_id.as_deref() {
        Some(id) => {
            let at = locate(&state, &auth, id).await?;
            (Some(at.id()?), Some(at.county.name().to_string()))
        }
        None => (None, None),
    };

    let message = store
        .messages
        .create_outbound(NewOutbound {
            to: req.to,
            from: state.settings.twilio.from_number.clone(),
            body: req.body,
            case_id,
            county,
            sent_by: Some(auth.uid().to_string()),
        })
        .await?;

    if let (Some(queue), Some(id)) = (&state.outbound, message.id) {
        if let Err(e) = queue.push(id, &message.to, &message.body).await {
            warn!(message = %id, error = %e, "Failed to enqueue outbound SMS; left queued");
        }
    }

    Ok((StatusCode::ACCEPTED, Json(to_response(message))))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub case_id: Option<String>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

pub async fn list(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(q): Query<ListQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    auth.require(VIEW_CASES)?;
    let store = state.store()?;

    let case_id = match q.case_id.as_deref() {
        Some(id) => Some(locate(&state, &auth, id).await?.id()?),
        None => {
            auth.require(VIEW_ALL_DEPARTMENTS)?;
            None
        }
    };

    let defaults = PaginationParams::default();
    let params = PaginationParams {
        page: q.page.unwrap_or(defaults.page),
        per_page: q.per_page.unwrap_or(defaults.per_page),
    };
    let result = store.messages.list(case_id, &params).await?;
    let items: Vec<MessageResponse> = result.items.into_iter().map(to_response).collect();

    Ok(Json(serde_json::json!({
        "items": items,
        "total": result.total,
        "page": result.page,
        "per_page": result.per_page,
        "total_pages": result.total_pages,
    })))
}
