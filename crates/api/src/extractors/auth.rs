use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use bailbook_db::models::{User, UserStatus};
use bailbook_services::auth::{AuthError, permissions};
use bailbook_services::dao::base::DaoError;
use bailbook_services::filter::Filter;

use crate::{error::ApiError, state::AppState};

/// The staff member behind the session cookie or bearer token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: User,
    pub permissions: u64,
}

impl AuthUser {
    pub fn uid(&self) -> &str {
        &self.user.uid
    }

    pub fn require(&self, flag: u64) -> Result<(), ApiError> {
        if permissions::has(self.permissions, flag) {
            Ok(())
        } else {
            Err(ApiError::Forbidden("Missing permission".to_string()))
        }
    }

    /// Match filter limiting case queries to what this user may see.
    pub fn case_scope(&self) -> Filter {
        permissions::case_scope(&self.user)
    }
}

fn session_token(parts: &Parts, cookie_name: &str) -> Option<String> {
    let bearer = parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|s| s.trim().to_string());

    bearer.or_else(|| {
        parts
            .headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|cookies| cookies.split(';'))
            .find_map(|cookie| {
                let (name, value) = cookie.trim().split_once('=')?;
                (name == cookie_name).then(|| value.to_string())
            })
    })
}

impl<S> FromRequestParts<S> for AuthUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);
        let store = app_state.store()?;

        let token = session_token(parts, app_state.auth.cookie_name())
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::MissingSession)?;
        let claims = app_state.auth.verify(&token)?;

        let user = match store.users.find_by_uid(&claims.sub).await {
            Ok(user) => user,
            Err(DaoError::NotFound) => {
                return Err(ApiError::Unauthorized("Unknown user".to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        if user.status == UserStatus::Disabled {
            return Err(ApiError::Forbidden("Account disabled".to_string()));
        }

        let permissions = permissions::for_user(&user);
        Ok(AuthUser { user, permissions })
    }
}

/// Helper trait for extracting AppState from composite state types
pub trait FromRef<T> {
    fn from_ref(input: &T) -> Self;
}

impl FromRef<AppState> for AppState {
    fn from_ref(input: &AppState) -> Self {
        input.clone()
    }
}
