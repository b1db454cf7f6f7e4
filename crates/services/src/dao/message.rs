use bson::{doc, oid::ObjectId, DateTime};
use mongodb::Database;
use bailbook_db::models::{Direction, Message, MessageStatus, StatusChange};
use tracing::debug;

use super::base::{BaseDao, DaoError, DaoResult, PaginatedResult, PaginationParams};

pub struct MessageDao {
    pub base: BaseDao<Message>,
}

/// Outgoing text as the staff member submitted it.
#[derive(Debug, Clone)]
pub struct NewOutbound {
    pub to: String,
    pub from: String,
    pub body: String,
    pub case_id: Option<ObjectId>,
    pub county: Option<String>,
    pub sent_by: Option<String>,
}

/// Result of applying a provider status callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusOutcome {
    Applied(MessageStatus),
    /// Stale or repeated callback; the stored status is further along.
    Ignored(MessageStatus),
    UnknownSid,
}

impl MessageDao {
    pub fn new(db: &Database) -> Self {
        Self {
            base: BaseDao::new(db, Message::COLLECTION),
        }
    }

    pub async fn create_outbound(&self, new: NewOutbound) -> DaoResult<Message> {
        let now = DateTime::now();
        let message = Message {
            id: None,
            case_id: new.case_id,
            county: new.county,
            direction: Direction::Outbound,
            to: new.to,
            from: new.from,
            body: new.body,
            status: MessageStatus::Queued,
            provider_sid: None,
            error_code: None,
            error_message: None,
            status_history: vec![StatusChange {
                status: MessageStatus::Queued,
                at: now,
            }],
            sent_by: new.sent_by,
            created_at: now,
            updated_at: now,
        };

        let id = self.base.insert_one(&message).await?;
        self.base.find_by_id(id).await
    }

    pub async fn list(
        &self,
        case_id: Option<ObjectId>,
        params: &PaginationParams,
    ) -> DaoResult<PaginatedResult<Message>> {
        let filter = match case_id {
            Some(id) => doc! { "case_id": id },
            None => doc! {},
        };
        self.base
            .find_paginated(filter, Some(doc! { "created_at": -1, "_id": -1 }), params)
            .await
    }

    pub async fn find_by_sid(&self, sid: &str) -> DaoResult<Option<Message>> {
        self.base.find_one(doc! { "provider_sid": sid }).await
    }

    /// Moves the message with `sid` to `next` if that is a forward step.
    /// The update is conditional on the status read, so two racing
    /// callbacks cannot move it backwards.
    pub async fn apply_status(
        &self,
        sid: &str,
        next: MessageStatus,
        error_code: Option<String>,
        error_message: Option<String>,
    ) -> DaoResult<StatusOutcome> {
        let Some(current) = self.find_by_sid(sid).await? else {
            return Ok(StatusOutcome::UnknownSid);
        };
        if !current.status.can_advance_to(next) {
            debug!(sid, from = current.status.as_str(), to = next.as_str(), "Ignoring stale status");
            return Ok(StatusOutcome::Ignored(current.status));
        }

        let now = DateTime::now();
        let mut set = doc! { "status": next.as_str() };
        if let Some(code) = error_code {
            set.insert("error_code", code);
        }
        if let Some(message) = error_message {
            set.insert("error_message", message);
        }
        let history = bson::to_bson(&StatusChange { status: next, at: now })?;

        let matched = self
            .base
            .update_one(
                doc! { "provider_sid": sid, "status": current.status.as_str() },
                doc! { "$set": set, "$push": { "status_history": history } },
            )
            .await?;

        if matched == 0 {
            let latest = self
                .find_by_sid(sid)
                .await?
                .map(|m| m.status)
                .unwrap_or(current.status);
            return Ok(StatusOutcome::Ignored(latest));
        }
        Ok(StatusOutcome::Applied(next))
    }

    /// Stores a message received from a client. Provider retries carry the
    /// same sid and resolve to the stored copy.
    pub async fn record_inbound(
        &self,
        sid: Option<String>,
        from: String,
        to: String,
        body: String,
    ) -> DaoResult<Message> {
        if let Some(sid) = sid.as_deref() {
            if let Some(existing) = self.find_by_sid(sid).await? {
                return Ok(existing);
            }
        }

        // Thread the reply onto the case we last texted this number about.
        let last_outbound = self
            .base
            .collection()
            .find_one(doc! { "direction": "outbound", "to": from.as_str() })
            .sort(doc! { "created_at": -1 })
            .await?;

        let now = DateTime::now();
        let message = Message {
            id: None,
            case_id: last_outbound.as_ref().and_then(|m| m.case_id),
            county: last_outbound.and_then(|m| m.county),
            direction: Direction::Inbound,
            to,
            from,
            body,
            status: MessageStatus::Received,
            provider_sid: sid.clone(),
            error_code: None,
            error_message: None,
            status_history: vec![StatusChange {
                status: MessageStatus::Received,
                at: now,
            }],
            sent_by: None,
            created_at: now,
            updated_at: now,
        };

        match self.base.insert_one(&message).await {
            Ok(id) => self.base.find_by_id(id).await,
            Err(DaoError::DuplicateKey(_)) => {
                let sid = sid.unwrap_or_default();
                self.find_by_sid(&sid).await?.ok_or(DaoError::NotFound)
            }
            Err(e) => Err(e),
        }
    }
}
