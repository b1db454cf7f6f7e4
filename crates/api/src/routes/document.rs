use axum::{
    Json,
    body::Body,
    extract::{Multipart, Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::info;
use validator::Validate;

use bailbook_db::models::Attachment;
use bailbook_services::auth::permissions::{MANAGE_DOCUMENTS, VIEW_CASES};
use bailbook_services::dao::case::{AttachmentPatch, find_attachment};

use super::case::{AttachmentResponse, attachment_response, locate};
use crate::{error::ApiError, extractors::auth::AuthUser, state::AppState};

pub async fn list(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(case_id): Path<String>,
) -> Result<Json<Vec<AttachmentResponse>>, ApiError> {
    auth.require(VIEW_CASES)?;
    let at = locate(&state, &auth, &case_id).await?;
    let items = at
        .record
        .crm_details
        .attachments
        .into_iter()
        .map(attachment_response)
        .collect();
    Ok(Json(items))
}

fn text_field(value: String) -> Option<String> {
    let value = value.trim().to_string();
    (!value.is_empty()).then_some(value)
}

/// Upload one document via multipart form data.
/// Fields: `file` (binary), optional `label`, `note`, `checklist_key`.
pub async fn upload(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(case_id): Path<String>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<AttachmentResponse>), ApiError> {
    auth.require(MANAGE_DOCUMENTS)?;
    let at = locate(&state, &auth, &case_id).await?;

    let mut file_data: Option<(String, String, Vec<u8>)> = None;
    let mut label = None;
    let mut note = None;
    let mut checklist_key = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Multipart error: {e}")))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" => {
                let filename = field.file_name().unwrap_or("unnamed").to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Failed to read file: {e}")))?;
                file_data = Some((filename, content_type, bytes.to_vec()));
            }
            "label" | "note" | "checklist_key" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Failed to read field: {e}")))?;
                let slot = match name.as_str() {
                    "label" => &mut label,
                    "note" => &mut note,
                    _ => &mut checklist_key,
                };
                *slot = text_field(text);
            }
            _ => {}
        }
    }

    let (filename, content_type, bytes) =
        file_data.ok_or_else(|| ApiError::BadRequest("Missing 'file' field".to_string()))?;

    let case_oid = at.id()?;
    let storage_path = state.documents.save(at.county, case_oid, &bytes).await?;

    let attachment = Attachment {
        id: uuid::Uuid::new_v4().to_string(),
        filename,
        label,
        note,
        content_type,
        size: bytes.len() as u64,
        storage_path: storage_path.clone(),
        checklist_key,
        uploaded_by: Some(auth.uid().to_string()),
        uploaded_at: state.now(),
        updated_at: None,
    };

    if let Err(e) = state.store()?.cases.add_attachment(&at, &attachment).await {
        state.documents.remove(&storage_path).await;
        return Err(e.into());
    }
    info!(case = %case_oid, county = %at.county, attachment = %attachment.id, "Document uploaded");

    Ok((StatusCode::CREATED, Json(attachment_response(attachment))))
}

#[derive(Debug, Deserialize, Validate)]
pub struct AttachmentRequest {
    #[validate(length(max = 200))]
    pub label: Option<String>,
    #[validate(length(max = 2000))]
    pub note: Option<String>,
    #[validate(length(max = 64))]
    pub checklist_key: Option<String>,
}

pub async fn update(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((case_id, attachment_id)): Path<(String, String)>,
    Json(body): Json<AttachmentRequest>,
) -> Result<Json<AttachmentResponse>, ApiError> {
    auth.require(MANAGE_DOCUMENTS)?;
    body.validate()?;
    let at = locate(&state, &auth, &case_id).await?;

    let patch = AttachmentPatch {
        label: body.label,
        note: body.note,
        checklist_key: body.checklist_key,
    };
    if patch.is_empty() {
        return Ok(Json(attachment_response(find_attachment(&at.record, &attachment_id)?)));
    }

    let updated = state
        .store()?
        .cases
        .update_attachment(&at, &attachment_id, patch)
        .await?;
    Ok(Json(attachment_response(updated)))
}

pub async fn delete(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((case_id, attachment_id)): Path<(String, String)>,
) -> Result<Json<serde_json::Value>, ApiError> {
    auth.require(MANAGE_DOCUMENTS)?;
    let at = locate(&state, &auth, &case_id).await?;
    let removed = state
        .store()?
        .cases
        .remove_attachment(&at, &attachment_id)
        .await?;
    state.documents.remove(&removed.storage_path).await;
    Ok(Json(serde_json::json!({ "deleted": true, "id": removed.id })))
}

pub async fn download(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((case_id, attachment_id)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    auth.require(VIEW_CASES)?;
    let at = locate(&state, &auth, &case_id).await?;
    let attachment = find_attachment(&at.record, &attachment_id)?;
    let contents = state.documents.read(&attachment.storage_path).await?;

    let disposition = content_disposition(&attachment.filename);
    Ok((
        [
            (header::CONTENT_TYPE, attachment.content_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        Body::from(contents),
    )
        .into_response())
}

/// `attachment` disposition with an ASCII fallback name plus the exact
/// name as an RFC 5987 `filename*` parameter.
fn content_disposition(filename: &str) -> String {
    let fallback: String = filename
        .chars()
        .map(|c| match c {
            ' '..='~' if c != '"' && c != '\\' => c,
            _ => '_',
        })
        .collect();
    format!(
        "attachment; filename=\"{fallback}\"; filename*=UTF-8''{}",
        urlencoding::encode(filename)
    )
}
