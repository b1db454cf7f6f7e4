use bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};

/// An SMS exchanged with a client or indemnitor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub case_id: Option<ObjectId>,
    pub county: Option<String>,
    pub direction: Direction,
    pub to: String,
    pub from: String,
    pub body: String,
    #[serde(default)]
    pub status: MessageStatus,
    /// Unique once set; left out of the document until the provider assigns it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_sid: Option<String>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    #[serde(default)]
    pub status_history: Vec<StatusChange>,
    pub sent_by: Option<String>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Outbound,
    Inbound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    #[default]
    Queued,
    Sent,
    Delivered,
    Failed,
    Received,
}

impl MessageStatus {
    /// Maps a provider callback status onto the local lifecycle.
    pub fn from_provider(status: &str) -> Option<MessageStatus> {
        match status.trim().to_ascii_lowercase().as_str() {
            "accepted" | "scheduled" | "queued" => Some(MessageStatus::Queued),
            "sending" | "sent" => Some(MessageStatus::Sent),
            "delivered" | "read" => Some(MessageStatus::Delivered),
            "undelivered" | "failed" | "canceled" => Some(MessageStatus::Failed),
            "receiving" | "received" => Some(MessageStatus::Received),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            MessageStatus::Delivered | MessageStatus::Failed | MessageStatus::Received
        )
    }

    fn rank(self) -> u8 {
        match self {
            MessageStatus::Queued => 0,
            MessageStatus::Sent => 1,
            MessageStatus::Delivered | MessageStatus::Failed | MessageStatus::Received => 2,
        }
    }

    /// Callbacks arrive out of order; a status only ever moves forward.
    pub fn can_advance_to(self, next: MessageStatus) -> bool {
        !self.is_terminal() && next.rank() > self.rank()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MessageStatus::Queued => "queued",
            MessageStatus::Sent => "sent",
            MessageStatus::Delivered => "delivered",
            MessageStatus::Failed => "failed",
            MessageStatus::Received => "received",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusChange {
    pub status: MessageStatus,
    pub at: DateTime,
}

impl Message {
    pub const COLLECTION: &'static str = "messages";
}
