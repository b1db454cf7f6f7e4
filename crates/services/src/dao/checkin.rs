use bson::{doc, oid::ObjectId, DateTime};
use mongodb::Database;
use bailbook_db::models::{CheckIn, CheckInPing, CheckInStatus, County};
use tracing::info;

use super::base::{BaseDao, DaoError, DaoResult};

pub struct CheckInDao {
    pub base: BaseDao<CheckIn>,
    pub pings: BaseDao<CheckInPing>,
}

#[derive(Debug, Clone, Copy)]
pub struct PingReport {
    pub lat: f64,
    pub lng: f64,
    pub accuracy_m: Option<f64>,
}

impl PingReport {
    pub fn validate(&self) -> DaoResult<()> {
        if !(-90.0..=90.0).contains(&self.lat) || !(-180.0..=180.0).contains(&self.lng) {
            return Err(DaoError::Validation("lat/lng out of range".to_string()));
        }
        if self.accuracy_m.is_some_and(|a| !a.is_finite() || a < 0.0) {
            return Err(DaoError::Validation("accuracy_m must be non-negative".to_string()));
        }
        Ok(())
    }
}

impl CheckInDao {
    pub fn new(db: &Database) -> Self {
        Self {
            base: BaseDao::new(db, CheckIn::COLLECTION),
            pings: BaseDao::new(db, CheckInPing::COLLECTION),
        }
    }

    pub async fn create(
        &self,
        case_id: ObjectId,
        county: County,
        due_at: DateTime,
        note: Option<String>,
        created_by: &str,
    ) -> DaoResult<CheckIn> {
        let now = DateTime::now();
        let checkin = CheckIn {
            id: None,
            case_id,
            county: county.name().to_string(),
            due_at,
            status: CheckInStatus::Pending,
            note,
            completed_at: None,
            created_by: Some(created_by.to_string()),
            created_at: now,
            updated_at: now,
        };
        let id = self.base.insert_one(&checkin).await?;
        self.base.find_by_id(id).await
    }

    pub async fn for_case(&self, case_id: ObjectId) -> DaoResult<Vec<CheckIn>> {
        self.base
            .find_many(doc! { "case_id": case_id }, Some(doc! { "due_at": -1 }))
            .await
    }

    pub async fn find(&self, id: ObjectId) -> DaoResult<CheckIn> {
        self.base.find_by_id(id).await
    }

    /// Completes a check-in. Completing one already done keeps the original
    /// timestamp.
    pub async fn complete(&self, id: ObjectId, now: DateTime) -> DaoResult<CheckIn> {
        self.base
            .update_one(
                doc! { "_id": id, "status": { "$ne": "done" } },
                doc! { "$set": { "status": "done", "completed_at": now } },
            )
            .await?;
        self.base.find_by_id(id).await
    }

    pub async fn record_ping(&self, checkin: &CheckIn, ping: PingReport) -> DaoResult<CheckInPing> {
        ping.validate()?;
        let checkin_id = checkin.id.ok_or(DaoError::NotFound)?;
        let record = CheckInPing {
            id: None,
            checkin_id,
            case_id: checkin.case_id,
            lat: ping.lat,
            lng: ping.lng,
            accuracy_m: ping.accuracy_m,
            received_at: DateTime::now(),
        };
        let id = self.pings.insert_one(&record).await?;
        self.pings.find_by_id(id).await
    }

    /// Pending check-ins past due become overdue. Returns how many moved.
    pub async fn sweep_overdue(&self, now: DateTime) -> DaoResult<u64> {
        let result = self
            .base
            .collection()
            .update_many(
                doc! { "status": "pending", "due_at": { "$lt": now } },
                doc! { "$set": { "status": "overdue", "updated_at": DateTime::now() } },
            )
            .await?;
        if result.modified_count > 0 {
            info!(count = result.modified_count, "Marked check-ins overdue");
        }
        Ok(result.modified_count)
    }
}
