//! Redis-list queue transport using the reliable-queue pattern.
//!
//! Producers `LPUSH` payloads onto the queue list. The processor moves each
//! payload to a per-queue processing list with `LMOVE` (so a crash mid-flight
//! leaves the payload recoverable), and explicit completion `LREM`s it from
//! the processing list. A failed delivery is atomically moved back onto the
//! tail of the queue for redelivery.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use tokio_util::sync::CancellationToken;

use courier_common::error::DispatchError;

use crate::envelope::Envelope;
use crate::processor::{
    self, CompleteMessage, ErrorHandler, MessageEvent, MessageHandler, ProcessorOptions,
    QueueClient, QueueProcessor,
};

/// Queue client backed by Redis lists.
#[derive(Clone)]
pub struct RedisQueueClient {
    redis: ConnectionManager,
    poll_interval: Duration,
}

impl RedisQueueClient {
    pub fn new(redis: ConnectionManager, poll_interval_ms: u64) -> Self {
        Self {
            redis,
            poll_interval: Duration::from_millis(poll_interval_ms),
        }
    }
}

impl QueueClient for RedisQueueClient {
    type Processor = RedisQueueProcessor;

    fn create_processor(&self, queue: &str, options: ProcessorOptions) -> RedisQueueProcessor {
        RedisQueueProcessor {
            redis: self.redis.clone(),
            queue: queue.to_string(),
            processing_queue: format!("{}:processing", queue),
            poll_interval: self.poll_interval,
            options,
            on_message: Vec::new(),
            on_error: Vec::new(),
        }
    }
}

/// Receive loop over a Redis list queue.
pub struct RedisQueueProcessor {
    redis: ConnectionManager,
    queue: String,
    processing_queue: String,
    poll_interval: Duration,
    options: ProcessorOptions,
    on_message: Vec<MessageHandler>,
    on_error: Vec<ErrorHandler>,
}

impl RedisQueueProcessor {
    /// Pop the next payload into the processing list. `None` means the queue
    /// is currently empty.
    async fn receive(&self) -> Result<Option<String>, DispatchError> {
        let mut conn = self.redis.clone();
        let body: Option<String> = redis::cmd("LMOVE")
            .arg(&self.queue)
            .arg(&self.processing_queue)
            .arg("RIGHT")
            .arg("LEFT")
            .query_async(&mut conn)
            .await
            .map_err(|e| DispatchError::Queue(e.to_string()))?;
        Ok(body)
    }

    /// Move a failed payload from the processing list to the back of the
    /// queue. Producers LPUSH and `receive` serves the RIGHT end, so LPUSH
    /// here puts the retry behind every other queued message instead of
    /// spinning on it.
    async fn requeue(&self, envelope: &Envelope) -> Result<(), DispatchError> {
        let mut conn = self.redis.clone();
        redis::pipe()
            .atomic()
            .cmd("LREM")
            .arg(&self.processing_queue)
            .arg(1)
            .arg(&envelope.body)
            .ignore()
            .cmd("LPUSH")
            .arg(&self.queue)
            .arg(&envelope.body)
            .ignore()
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| DispatchError::Queue(e.to_string()))?;
        Ok(())
    }

    async fn dispatch(&self, envelope: Envelope) {
        let completer = Arc::new(RedisCompleter {
            redis: self.redis.clone(),
            processing_queue: self.processing_queue.clone(),
        });
        let event = MessageEvent::new(envelope.clone(), completer);

        if processor::deliver(&self.on_message, &self.on_error, event.clone()).await {
            if self.options.auto_complete {
                if let Err(error) = event.complete().await {
                    processor::raise_error(&self.on_error, "auto-completing message", error).await;
                }
            }
        } else if let Err(error) = self.requeue(&envelope).await {
            processor::raise_error(&self.on_error, "requeueing failed message", error).await;
        }
    }
}

#[async_trait]
impl QueueProcessor for RedisQueueProcessor {
    fn on_message(&mut self, handler: MessageHandler) {
        self.on_message.push(handler);
    }

    fn on_error(&mut self, handler: ErrorHandler) {
        self.on_error.push(handler);
    }

    async fn start(&self, cancel: CancellationToken) -> Result<(), DispatchError> {
        if self.on_message.is_empty() {
            return Err(DispatchError::Queue(
                "no message handler registered".to_string(),
            ));
        }

        tracing::info!(
            queue = %self.queue,
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            "Queue processor started"
        );

        loop {
            if cancel.is_cancelled() {
                break;
            }

            // The LMOVE is never raced against cancellation: dropping it
            // mid-flight could strand a payload in the processing list after
            // the server already moved it. Only the empty-queue sleep below
            // is cancellable, so cancellation latency stays within one poll
            // interval.
            match self.receive().await {
                Ok(Some(body)) => {
                    // In-flight deliveries run to completion; cancellation
                    // only stops the pull of new envelopes.
                    self.dispatch(Envelope::new(body)).await;
                }
                Ok(None) => {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(self.poll_interval) => {}
                    }
                }
                Err(error) => {
                    // Transport faults are observational; keep the loop alive
                    // and let redelivery semantics do the rest.
                    tracing::error!(queue = %self.queue, error = %error, "Failed to receive from queue");
                    processor::raise_error(&self.on_error, "receiving from queue", error).await;
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(self.poll_interval) => {}
                    }
                }
            }
        }

        tracing::info!(queue = %self.queue, "Queue processor stopped");
        Ok(())
    }
}

struct RedisCompleter {
    redis: ConnectionManager,
    processing_queue: String,
}

#[async_trait]
impl CompleteMessage for RedisCompleter {
    async fn complete(&self, envelope: &Envelope) -> Result<(), DispatchError> {
        let mut conn = self.redis.clone();
        redis::cmd("LREM")
            .arg(&self.processing_queue)
            .arg(1)
            .arg(&envelope.body)
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| DispatchError::Queue(e.to_string()))?;
        Ok(())
    }
}
