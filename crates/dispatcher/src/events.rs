//! Completion-event publishing.

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;

use courier_common::error::DispatchError;

/// Topic published after a successful SMS delivery.
pub const SMS_SENT_TOPIC: &str = "notifications.sms.sent";

/// Human-readable confirmation payload for [`SMS_SENT_TOPIC`].
pub const SMS_SENT_CONFIRMATION: &str = "SMS sent successfully";

/// Capability that publishes a named event with a payload.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, topic: &str, payload: &str) -> Result<(), DispatchError>;
}

/// Event publisher over Redis pub/sub.
#[derive(Clone)]
pub struct RedisEventPublisher {
    redis: ConnectionManager,
}

impl RedisEventPublisher {
    pub fn new(redis: ConnectionManager) -> Self {
        Self { redis }
    }
}

#[async_trait]
impl EventPublisher for RedisEventPublisher {
    async fn publish(&self, topic: &str, payload: &str) -> Result<(), DispatchError> {
        let mut conn = self.redis.clone();
        conn.publish::<_, _, ()>(topic, payload)
            .await
            .map_err(|e| DispatchError::Publish(e.to_string()))?;
        Ok(())
    }
}
