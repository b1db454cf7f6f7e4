//! Hand-off of queued outbound messages to the delivery worker.

use bson::oid::ObjectId;
use redis::{AsyncCommands, Client, aio::ConnectionManager};
use serde::Serialize;
use tracing::info;

use bailbook_config::RedisSettings;

#[derive(Clone)]
pub struct OutboundQueue {
    conn: ConnectionManager,
    key: String,
}

#[derive(Debug, Serialize)]
struct OutboundJob<'a> {
    message_id: String,
    to: &'a str,
    body: &'a str,
}

impl OutboundQueue {
    /// Connects when `redis.url` is set; `Ok(None)` otherwise.
    pub async fn connect(settings: &RedisSettings) -> redis::RedisResult<Option<Self>> {
        let Some(url) = settings.url.as_deref().filter(|u| !u.trim().is_empty()) else {
            return Ok(None);
        };
        let client = Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        info!(queue = %settings.outbound_queue, "Connected to Redis for outbound SMS");
        Ok(Some(Self {
            conn,
            key: settings.outbound_queue.clone(),
        }))
    }

    pub async fn push(&self, message_id: ObjectId, to: &str, body: &str) -> redis::RedisResult<()> {
        let payload = serde_json::to_string(&OutboundJob {
            message_id: message_id.to_hex(),
            to,
            body,
        })
        .map_err(|e| {
            redis::RedisError::from((redis::ErrorKind::TypeError, "encode", e.to_string()))
        })?;

        let mut conn = self.conn.clone();
        let _: () = conn.lpush(&self.key, payload).await?;
        Ok(())
    }
}
