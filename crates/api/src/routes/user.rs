use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use bailbook_db::models::{User, UserStatus};
use bailbook_services::auth::permissions::{self, MANAGE_USERS};
use bailbook_services::dao::base::PaginationParams;
use bailbook_services::dao::user::AccessUpdate;

use crate::{error::ApiError, extractors::auth::AuthUser, state::AppState};

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: String,
    pub uid: String,
    pub email: String,
    pub display_name: Option<String>,
    pub roles: Vec<String>,
    pub departments: Vec<String>,
    pub status: UserStatus,
    pub permissions: u64,
    pub created_at: String,
}

fn to_response(user: User) -> UserResponse {
    let permissions = permissions::for_user(&user);
    UserResponse {
        id: user.id.map(|id| id.to_hex()).unwrap_or_default(),
        uid: user.uid,
        email: user.email,
        display_name: user.display_name,
        roles: user.roles,
        departments: user.departments,
        status: user.status,
        permissions,
        created_at: user.created_at.try_to_rfc3339_string().unwrap_or_default(),
    }
}

pub async fn me(auth: AuthUser) -> Json<UserResponse> {
    Json(to_response(auth.user))
}

pub async fn list(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(params): Query<PaginationParams>,
) -> Result<Json<serde_json::Value>, ApiError> {
    auth.require(MANAGE_USERS)?;
    let result = state.store()?.users.list(&params).await?;
    let items: Vec<UserResponse> = result.items.into_iter().map(to_response).collect();

    Ok(Json(serde_json::json!({
        "items": items,
        "total": result.total,
        "page": result.page,
        "per_page": result.per_page,
        "total_pages": result.total_pages,
    })))
}

#[derive(Debug, Deserialize, Validate)]
pub struct AccessRequest {
    #[validate(length(max = 8))]
    pub roles: Option<Vec<String>>,
    #[validate(length(max = 32))]
    pub departments: Option<Vec<String>>,
    pub status: Option<UserStatus>,
}

pub async fn update_access(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(uid): Path<String>,
    Json(body): Json<AccessRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    auth.require(MANAGE_USERS)?;
    body.validate()?;

    if uid == auth.uid() && body.status == Some(UserStatus::Disabled) {
        return Err(ApiError::Validation("Cannot disable your own account".to_string()));
    }

    let user = state
        .store()?
        .users
        .update_access(
            &uid,
            AccessUpdate {
                roles: body.roles,
                departments: body.departments,
                status: body.status,
            },
        )
        .await?;
    Ok(Json(to_response(user)))
}
