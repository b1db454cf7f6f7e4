use bson::{doc, DateTime, Document};
use mongodb::Database;
use bailbook_db::models::{User, UserStatus};

use super::base::{BaseDao, DaoError, DaoResult, PaginatedResult, PaginationParams};
use crate::auth::permissions;

pub struct UserDao {
    pub base: BaseDao<User>,
}

/// Fields an administrator may change; `None` leaves the field alone.
#[derive(Debug, Default, Clone)]
pub struct AccessUpdate {
    pub roles: Option<Vec<String>>,
    pub departments: Option<Vec<String>>,
    pub status: Option<UserStatus>,
}

impl UserDao {
    pub fn new(db: &Database) -> Self {
        Self {
            base: BaseDao::new(db, User::COLLECTION),
        }
    }

    pub async fn create(
        &self,
        uid: String,
        email: String,
        display_name: Option<String>,
        roles: Vec<String>,
        departments: Vec<String>,
    ) -> DaoResult<User> {
        reject_unknown_roles(&roles)?;
        let now = DateTime::now();
        let user = User {
            id: None,
            uid,
            email,
            display_name,
            roles,
            departments,
            status: UserStatus::Active,
            created_at: now,
            updated_at: now,
        };

        let id = self.base.insert_one(&user).await?;
        self.base.find_by_id(id).await
    }

    pub async fn find_by_uid(&self, uid: &str) -> DaoResult<User> {
        self.base
            .find_one(doc! { "uid": uid })
            .await?
            .ok_or(DaoError::NotFound)
    }

    pub async fn list(&self, params: &PaginationParams) -> DaoResult<PaginatedResult<User>> {
        self.base
            .find_paginated(doc! {}, Some(doc! { "email": 1 }), params)
            .await
    }

    pub async fn update_access(&self, uid: &str, update: AccessUpdate) -> DaoResult<User> {
        let mut set = Document::new();
        if let Some(roles) = update.roles {
            reject_unknown_roles(&roles)?;
            set.insert("roles", roles);
        }
        if let Some(departments) = update.departments {
            set.insert("departments", departments);
        }
        if let Some(status) = update.status {
            set.insert("status", bson::to_bson(&status)?);
        }

        if !set.is_empty() {
            let matched = self
                .base
                .update_one(doc! { "uid": uid }, doc! { "$set": set })
                .await?;
            if matched == 0 {
                return Err(DaoError::NotFound);
            }
        }
        self.find_by_uid(uid).await
    }
}

fn reject_unknown_roles(roles: &[String]) -> DaoResult<()> {
    let unknown = permissions::unknown_roles(roles);
    if unknown.is_empty() {
        Ok(())
    } else {
        Err(DaoError::Validation(format!(
            "unknown roles: {} (known: {})",
            unknown.join(", "),
            permissions::ROLE_NAMES.join(", ")
        )))
    }
}
