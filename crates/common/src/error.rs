use thiserror::Error;

/// Common error types used across the dispatcher pipeline.
///
/// Every variant here must leave the source envelope uncompleted when it
/// escapes the arrival handler, so that the queue redelivers the message.
/// Malformed payloads are deliberately NOT an error variant: the coordinator
/// absorbs them and completes the envelope, because a malformed message
/// cannot become well-formed on redelivery.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Queue transport error: {0}")]
    Queue(String),

    #[error("Idempotence store error: {0}")]
    Store(String),

    #[error("Notification delivery failed: {0}")]
    DeliveryFailed(String),

    #[error("Event publish error: {0}")]
    Publish(String),
}
