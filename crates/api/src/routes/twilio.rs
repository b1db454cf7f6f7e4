use axum::{
    Form, Json,
    extract::{OriginalUri, State},
    http::{HeaderMap, Uri, header},
    response::IntoResponse,
};
use tracing::{debug, info, warn};

use bailbook_db::models::MessageStatus;
use bailbook_services::dao::message::StatusOutcome;
use bailbook_services::twilio::{self, EMPTY_TWIML, SIGNATURE_HEADER, form_value};

use crate::{error::ApiError, state::AppState};

type WebhookForm = Vec<(String, String)>;

/// Rejects webhook calls whose signature does not match the configured token.
fn verify_signature(
    state: &AppState,
    uri: &Uri,
    headers: &HeaderMap,
    form: &WebhookForm,
) -> Result<(), ApiError> {
    let path = uri.path_and_query().map(|p| p.as_str()).unwrap_or(uri.path());
    let url = twilio::webhook_url(&state.settings.twilio.public_base_url, path);
    let header = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());

    twilio::verify(&state.settings.twilio.auth_token, &url, form, header).map_err(|e| {
        warn!(url = %url, error = %e, "Rejected webhook signature");
        ApiError::from(e)
    })
}

/// Delivery status callback.
pub async fn status(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    Form(form): Form<WebhookForm>,
) -> Result<Json<serde_json::Value>, ApiError> {
    verify_signature(&state, &uri, &headers, &form)?;
    let store = state.store()?;

    let sid = form_value(&form, "MessageSid")
        .or_else(|| form_value(&form, "SmsSid"))
        .ok_or_else(|| ApiError::BadRequest("Missing MessageSid".to_string()))?;
    let raw_status = form_value(&form, "MessageStatus")
        .or_else(|| form_value(&form, "SmsStatus"))
        .unwrap_or("");

    let Some(next) = MessageStatus::from_provider(raw_status) else {
        debug!(sid, status = raw_status, "Ignoring unmapped provider status");
        return Ok(Json(serde_json::json!({ "ok": true, "applied": false })));
    };

    let outcome = store
        .messages
        .apply_status(
            sid,
            next,
            form_value(&form, "ErrorCode").map(str::to_string),
            form_value(&form, "ErrorMessage").map(str::to_string),
        )
        .await?;

    let body = match outcome {
        StatusOutcome::Applied(s) => {
            info!(sid, status = s.as_str(), "Message status updated");
            serde_json::json!({ "ok": true, "applied": true, "status": s.as_str() })
        }
        StatusOutcome::Ignored(s) => {
            serde_json::json!({ "ok": true, "applied": false, "status": s.as_str() })
        }
        StatusOutcome::UnknownSid => {
            debug!(sid, "Status callback for unknown message");
            serde_json::json!({ "ok": true, "applied": false })
        }
    };
    Ok(Json(body))
}

/// Incoming SMS from a client. Replies with empty TwiML so nothing is
/// auto-sent back.
pub async fn inbound(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    Form(form): Form<WebhookForm>,
) -> Result<impl IntoResponse, ApiError> {
    verify_signature(&state, &uri, &headers, &form)?;
    let store = state.store()?;

    let from = form_value(&form, "From")
        .ok_or_else(|| ApiError::BadRequest("Missing From".to_string()))?;
    let to = form_value(&form, "To").unwrap_or_default();
    let body = form
        .iter()
        .find(|(k, _)| k == "Body")
        .map(|(_, v)| v.clone())
        .unwrap_or_default();
    let sid = form_value(&form, "MessageSid")
        .or_else(|| form_value(&form, "SmsSid"))
        .map(str::to_string);

    let message = store
        .messages
        .record_inbound(sid, from.to_string(), to.to_string(), body)
        .await?;
    info!(
        message = ?message.id,
        case = ?message.case_id,
        "Inbound SMS recorded"
    );

    Ok(([(header::CONTENT_TYPE, "text/xml")], EMPTY_TWIML))
}
