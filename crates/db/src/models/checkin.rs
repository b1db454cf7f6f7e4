use bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckIn {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub case_id: ObjectId,
    pub county: String,
    pub due_at: DateTime,
    #[serde(default)]
    pub status: CheckInStatus,
    pub note: Option<String>,
    pub completed_at: Option<DateTime>,
    pub created_by: Option<String>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CheckInStatus {
    #[default]
    Pending,
    Overdue,
    Done,
}

/// A location report attached to a check-in, kept for audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckInPing {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub checkin_id: ObjectId,
    pub case_id: ObjectId,
    pub lat: f64,
    pub lng: f64,
    pub accuracy_m: Option<f64>,
    pub received_at: DateTime,
}

impl CheckIn {
    pub const COLLECTION: &'static str = "checkins";
}

impl CheckInPing {
    pub const COLLECTION: &'static str = "checkin_pings";
}
