use axum::{
    Json,
    extract::{Path, Query, State},
};
use bson::DateTime;
use serde::{Deserialize, Serialize};
use validator::Validate;

use bailbook_db::models::{
    Attachment, BookingRecord, ChecklistItem, County, CrmStage, Decision,
};
use bailbook_services::auth::permissions::{EDIT_CASES, VIEW_CASES};
use bailbook_services::dao::base::PaginationParams;
use bailbook_services::dao::case::{CaseQuery, CrmUpdate, Located};

use crate::{
    error::{ApiError, parse_id},
    extractors::auth::AuthUser,
    state::AppState,
};

#[derive(Debug, Serialize)]
pub struct ChecklistResponse {
    pub key: String,
    pub label: String,
    pub required: bool,
    pub completed: bool,
    pub completed_at: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AttachmentResponse {
    pub id: String,
    pub filename: String,
    pub label: Option<String>,
    pub note: Option<String>,
    pub content_type: String,
    pub size: u64,
    pub checklist_key: Option<String>,
    pub uploaded_by: Option<String>,
    pub uploaded_at: String,
    pub updated_at: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DecisionResponse {
    pub at: String,
    pub by: Option<String>,
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CrmResponse {
    pub qualification_notes: Option<String>,
    pub qualification_score: Option<i32>,
    pub assigned_to: Option<String>,
    pub assigned_department: Option<String>,
    pub checklist: Vec<ChecklistResponse>,
    pub attachments: Vec<AttachmentResponse>,
    pub acceptance: Option<DecisionResponse>,
    pub denial: Option<DecisionResponse>,
}

#[derive(Debug, Serialize)]
pub struct CaseResponse {
    pub id: String,
    pub county: String,
    pub category: Option<String>,
    pub full_name: Option<String>,
    pub booking_date: Option<String>,
    pub bond_amount: Option<f64>,
    pub bond_raw: Option<String>,
    pub bond_status: Option<String>,
    pub case_number: Option<String>,
    pub spn: Option<String>,
    pub crm_stage: &'static str,
    pub crm_details: CrmResponse,
    pub manual_tags: Vec<String>,
    pub tags: Vec<String>,
}

fn iso(at: DateTime) -> String {
    at.try_to_rfc3339_string().unwrap_or_default()
}

pub fn checklist_response(item: ChecklistItem) -> ChecklistResponse {
    ChecklistResponse {
        key: item.key,
        label: item.label,
        required: item.required,
        completed: item.completed,
        completed_at: item.completed_at.map(iso),
    }
}

pub fn attachment_response(a: Attachment) -> AttachmentResponse {
    AttachmentResponse {
        id: a.id,
        filename: a.filename,
        label: a.label,
        note: a.note,
        content_type: a.content_type,
        size: a.size,
        checklist_key: a.checklist_key,
        uploaded_by: a.uploaded_by,
        uploaded_at: iso(a.uploaded_at),
        updated_at: a.updated_at.map(iso),
    }
}

fn decision_response(d: Decision) -> DecisionResponse {
    DecisionResponse {
        at: iso(d.at),
        by: d.by,
        reason: d.reason,
    }
}

fn to_response(county: County, r: BookingRecord) -> CaseResponse {
    let crm_stage = r.stage().as_str();
    let crm = r.crm_details;
    CaseResponse {
        id: r.id.map(|id| id.to_hex()).unwrap_or_default(),
        county: county.name().to_string(),
        category: r.category,
        full_name: r.full_name,
        booking_date: r.booking_date,
        bond_amount: r.bond_amount,
        bond_raw: r.bond_raw,
        bond_status: r.bond_status,
        case_number: r.case_number,
        spn: r.spn,
        crm_stage,
        crm_details: CrmResponse {
            qualification_notes: crm.qualification.notes,
            qualification_score: crm.qualification.score,
            assigned_to: crm.assigned_to,
            assigned_department: crm.assigned_department,
            checklist: crm.checklist.into_iter().map(checklist_response).collect(),
            attachments: crm.attachments.into_iter().map(attachment_response).collect(),
            acceptance: crm.acceptance.map(decision_response),
            denial: crm.denial.map(decision_response),
        },
        manual_tags: r.manual_tags,
        tags: r.tags,
    }
}

fn located_response(at: Located) -> CaseResponse {
    to_response(at.county, at.record)
}

/// Resolves a case id the caller is allowed to see.
pub async fn locate(state: &AppState, auth: &AuthUser, case_id: &str) -> Result<Located, ApiError> {
    let id = parse_id(case_id, "case id")?;
    Ok(state.store()?.cases.locate(id, &auth.case_scope()).await?)
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub county: Option<String>,
    pub stage: Option<String>,
    pub q: Option<String>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

impl ListQuery {
    fn pagination(&self) -> PaginationParams {
        let defaults = PaginationParams::default();
        PaginationParams {
            page: self.page.unwrap_or(defaults.page),
            per_page: self.per_page.unwrap_or(defaults.per_page),
        }
        .normalized()
    }
}

pub async fn list(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    auth.require(VIEW_CASES)?;
    let store = state.store()?;

    let county = match query.county.as_deref().filter(|c| !c.trim().is_empty()) {
        Some(c) => Some(
            County::parse(c).ok_or_else(|| ApiError::BadRequest(format!("Unknown county: {c}")))?,
        ),
        None => None,
    };
    let stage = match query.stage.as_deref().filter(|s| !s.trim().is_empty()) {
        Some(s) => Some(
            CrmStage::parse(s).ok_or_else(|| ApiError::BadRequest(format!("Unknown stage: {s}")))?,
        ),
        None => None,
    };

    let page = query.pagination();
    let case_query = CaseQuery {
        county,
        stage,
        q: query.q,
    };
    let result = store
        .cases
        .list(&case_query, auth.case_scope(), &page)
        .await?;

    Ok(Json(serde_json::json!({
        "items": result.items,
        "total": result.total,
        "page": result.page,
        "per_page": result.per_page,
        "total_pages": result.total_pages,
    })))
}

pub async fn get(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(case_id): Path<String>,
) -> Result<Json<CaseResponse>, ApiError> {
    auth.require(VIEW_CASES)?;
    let at = locate(&state, &auth, &case_id).await?;
    Ok(Json(located_response(at)))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CrmRequest {
    pub crm_stage: Option<String>,
    #[validate(length(max = 128))]
    pub assigned_to: Option<String>,
    #[validate(length(max = 128))]
    pub assigned_department: Option<String>,
    #[validate(length(max = 4000))]
    pub notes: Option<String>,
    #[validate(range(min = 0, max = 100))]
    pub score: Option<i32>,
    #[validate(length(max = 1000))]
    pub reason: Option<String>,
}

pub async fn update_crm(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(case_id): Path<String>,
    Json(body): Json<CrmRequest>,
) -> Result<Json<CaseResponse>, ApiError> {
    auth.require(EDIT_CASES)?;
    body.validate()?;

    let stage = match body.crm_stage.as_deref() {
        Some(s) => Some(
            CrmStage::parse(s).ok_or_else(|| ApiError::Validation(format!("Unknown stage: {s}")))?,
        ),
        None => None,
    };

    let at = locate(&state, &auth, &case_id).await?;
    let update = CrmUpdate {
        stage,
        assigned_to: body.assigned_to,
        assigned_department: body.assigned_department,
        notes: body.notes,
        score: body.score,
        reason: body.reason,
    };
    let updated = state.store()?.cases.update_crm(&at, update, auth.uid()).await?;
    Ok(Json(located_response(updated)))
}

#[derive(Debug, Deserialize)]
pub struct ChecklistRequest {
    pub completed: bool,
}

pub async fn set_checklist_item(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((case_id, key)): Path<(String, String)>,
    Json(body): Json<ChecklistRequest>,
) -> Result<Json<Vec<ChecklistResponse>>, ApiError> {
    auth.require(EDIT_CASES)?;
    let at = locate(&state, &auth, &case_id).await?;
    let checklist = state
        .store()?
        .cases
        .set_checklist_item(&at, &key, body.completed)
        .await?;
    Ok(Json(checklist.into_iter().map(checklist_response).collect()))
}
