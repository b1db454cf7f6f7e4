use bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};

/// One scrape/normalize run, written by the ingestion workers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub kind: String,
    pub county: Option<String>,
    #[serde(default)]
    pub status: JobStatus,
    pub started_at: Option<DateTime>,
    pub finished_at: Option<DateTime>,
    pub error: Option<String>,
    pub created_at: DateTime,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    #[default]
    Queued,
    Running,
    Success,
    Failed,
}

impl Job {
    pub const COLLECTION: &'static str = "jobs";
}
