use bson::doc;
use mongodb::Database;
use bailbook_db::models::{Job, JobStatus};

use super::base::{BaseDao, DaoResult};

pub struct JobDao {
    pub base: BaseDao<Job>,
}

impl JobDao {
    pub fn new(db: &Database) -> Self {
        Self {
            base: BaseDao::new(db, Job::COLLECTION),
        }
    }

    /// Most recent ingestion run that finished successfully.
    pub async fn latest_success(&self) -> DaoResult<Option<Job>> {
        let job = self
            .base
            .collection()
            .find_one(doc! { "status": bson::to_bson(&JobStatus::Success)? })
            .sort(doc! { "finished_at": -1 })
            .await?;
        Ok(job)
    }
}
