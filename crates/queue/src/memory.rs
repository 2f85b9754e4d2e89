//! In-memory queue transport for tests.
//!
//! `start` makes a single pass over the messages pending at that moment, so
//! an exhausted queue terminates the loop. Deliveries whose handlers fail
//! stay pending; running the processor again models queue redelivery.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use courier_common::error::DispatchError;

use crate::envelope::Envelope;
use crate::processor::{
    self, CompleteMessage, ErrorHandler, MessageEvent, MessageHandler, ProcessorOptions,
    QueueClient, QueueProcessor,
};

struct QueuedMessage {
    envelope: Envelope,
    processed: bool,
}

/// Shared in-memory message store. Clones refer to the same queue.
#[derive(Clone, Default)]
pub struct InMemoryQueue {
    messages: Arc<Mutex<Vec<QueuedMessage>>>,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a raw payload; returns the envelope id for assertions.
    pub fn push(&self, body: impl Into<String>) -> Uuid {
        let envelope = Envelope::new(body);
        let id = envelope.id;
        self.messages.lock().unwrap().push(QueuedMessage {
            envelope,
            processed: false,
        });
        id
    }

    /// Number of messages not yet completed.
    pub fn pending(&self) -> usize {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .filter(|m| !m.processed)
            .count()
    }

    pub fn is_processed(&self, id: Uuid) -> bool {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .any(|m| m.envelope.id == id && m.processed)
    }

    fn pending_envelopes(&self) -> Vec<Envelope> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .filter(|m| !m.processed)
            .map(|m| m.envelope.clone())
            .collect()
    }
}

/// Queue client over an [`InMemoryQueue`].
#[derive(Clone)]
pub struct InMemoryQueueClient {
    queue: InMemoryQueue,
}

impl InMemoryQueueClient {
    pub fn new(queue: InMemoryQueue) -> Self {
        Self { queue }
    }
}

impl QueueClient for InMemoryQueueClient {
    type Processor = InMemoryQueueProcessor;

    fn create_processor(&self, queue: &str, options: ProcessorOptions) -> InMemoryQueueProcessor {
        InMemoryQueueProcessor {
            name: queue.to_string(),
            queue: self.queue.clone(),
            options,
            on_message: Vec::new(),
            on_error: Vec::new(),
        }
    }
}

/// Single-pass processor over the in-memory queue.
pub struct InMemoryQueueProcessor {
    name: String,
    queue: InMemoryQueue,
    options: ProcessorOptions,
    on_message: Vec<MessageHandler>,
    on_error: Vec<ErrorHandler>,
}

#[async_trait]
impl QueueProcessor for InMemoryQueueProcessor {
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

        tracing::debug!(queue = %self.name, "In-memory queue processor started");

        for envelope in self.queue.pending_envelopes() {
            if cancel.is_cancelled() {
                break;
            }
            let completer = Arc::new(InMemoryCompleter {
                queue: self.queue.clone(),
            });
            let event = MessageEvent::new(envelope, completer);

            if processor::deliver(&self.on_message, &self.on_error, event.clone()).await
                && self.options.auto_complete
            {
                if let Err(error) = event.complete().await {
                    processor::raise_error(&self.on_error, "auto-completing message", error).await;
                }
            }
        }

        Ok(())
    }
}

struct InMemoryCompleter {
    queue: InMemoryQueue,
}

#[async_trait]
impl CompleteMessage for InMemoryCompleter {
    async fn complete(&self, envelope: &Envelope) -> Result<(), DispatchError> {
        let mut messages = self.queue.messages.lock().unwrap();
        match messages.iter_mut().find(|m| m.envelope.id == envelope.id) {
            Some(message) => {
                // One-way transition; completing twice is a no-op.
                message.processed = true;
                Ok(())
            }
            None => Err(DispatchError::Queue(format!(
                "unknown envelope {}",
                envelope.id
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn counting_handler(
        calls: Arc<AtomicUsize>,
        complete: bool,
        fail: bool,
    ) -> MessageHandler {
        Box::new(move |event: MessageEvent| {
            let calls = Arc::clone(&calls);
            Box::pin(async move {
                calls.fetch_add(1, Ordering::SeqCst);
                if fail {
                    return Err(DispatchError::DeliveryFailed("boom".to_string()));
                }
                if complete {
                    event.complete().await?;
                }
                Ok(())
            })
        })
    }

    #[tokio::test]
    async fn test_start_without_handler_fails() {
        let queue = InMemoryQueue::new();
        let processor = InMemoryQueueClient::new(queue)
            .create_processor("notifications", ProcessorOptions::default());

        let result = processor.start(CancellationToken::new()).await;
        assert!(matches!(result, Err(DispatchError::Queue(_))));
    }

    #[tokio::test]
    async fn test_completed_messages_are_not_redelivered() {
        let queue = InMemoryQueue::new();
        let id = queue.push("payload");

        let client = InMemoryQueueClient::new(queue.clone());
        let mut processor =
            client.create_processor("notifications", ProcessorOptions::default());
        let calls = Arc::new(AtomicUsize::new(0));
        processor.on_message(counting_handler(Arc::clone(&calls), true, false));

        processor.start(CancellationToken::new()).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(queue.is_processed(id));

        // Second pass sees nothing pending.
        processor.start(CancellationToken::new()).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_delivery_stays_pending() {
        let queue = InMemoryQueue::new();
        let id = queue.push("payload");

        let client = InMemoryQueueClient::new(queue.clone());
        let mut processor =
            client.create_processor("notifications", ProcessorOptions::default());
        let calls = Arc::new(AtomicUsize::new(0));
        let faults = Arc::new(AtomicUsize::new(0));
        processor.on_message(counting_handler(Arc::clone(&calls), false, true));
        let fault_count = Arc::clone(&faults);
        processor.on_error(Box::new(move |_event| {
            let fault_count = Arc::clone(&fault_count);
            Box::pin(async move {
                fault_count.fetch_add(1, Ordering::SeqCst);
            })
        }));

        processor.start(CancellationToken::new()).await.unwrap();
        assert!(!queue.is_processed(id));
        assert_eq!(queue.pending(), 1);
        assert_eq!(faults.load(Ordering::SeqCst), 1);

        // Redelivery: the same message is handled again on the next run.
        processor.start(CancellationToken::new()).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_handlers_invoked_in_registration_order() {
        let queue = InMemoryQueue::new();
        queue.push("payload");

        let client = InMemoryQueueClient::new(queue.clone());
        let mut processor =
            client.create_processor("notifications", ProcessorOptions::default());

        let order = Arc::new(Mutex::new(Vec::new()));
        for label in ["first", "second"] {
            let order = Arc::clone(&order);
            processor.on_message(Box::new(move |_event| {
                let order = Arc::clone(&order);
                Box::pin(async move {
                    order.lock().unwrap().push(label);
                    Ok(())
                })
            }));
        }

        processor.start(CancellationToken::new()).await.unwrap();
        assert_eq!(*order.lock().unwrap(), vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_auto_complete_marks_message_processed() {
        let queue = InMemoryQueue::new();
        let id = queue.push("payload");

        let client = InMemoryQueueClient::new(queue.clone());
        let mut processor = client.create_processor(
            "notifications",
            ProcessorOptions {
                auto_complete: true,
            },
        );
        let calls = Arc::new(AtomicUsize::new(0));
        processor.on_message(counting_handler(calls, false, false));

        processor.start(CancellationToken::new()).await.unwrap();
        assert!(queue.is_processed(id));
    }

    #[tokio::test]
    async fn test_cancelled_token_stops_before_delivery() {
        let queue = InMemoryQueue::new();
        let id = queue.push("payload");

        let client = InMemoryQueueClient::new(queue.clone());
        let mut processor =
            client.create_processor("notifications", ProcessorOptions::default());
        let calls = Arc::new(AtomicUsize::new(0));
        processor.on_message(counting_handler(Arc::clone(&calls), true, false));

        let cancel = CancellationToken::new();
        cancel.cancel();
        processor.start(cancel).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(!queue.is_processed(id));
    }
}
