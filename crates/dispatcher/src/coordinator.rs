//! Bridges raw queue envelopes to the notification dispatcher.
//!
//! The coordinator owns the completion decision: an envelope is completed
//! only after the dispatcher returns successfully, or when its payload is
//! malformed (a malformed message cannot become well-formed on redelivery,
//! so retrying it is pointless). Dispatcher errors propagate out of the
//! arrival handler, leaving the envelope for the queue to redeliver.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use courier_common::error::DispatchError;
use courier_common::types::NotificationRequest;
use courier_queue::processor::{MessageEvent, ProcessorOptions, QueueClient, QueueProcessor};

use crate::handler::NotificationDispatcher;

pub struct ProcessingCoordinator<C: QueueClient> {
    client: C,
    queue: String,
    dispatcher: Arc<NotificationDispatcher>,
}

impl<C: QueueClient> ProcessingCoordinator<C> {
    pub fn new(client: C, queue: String, dispatcher: Arc<NotificationDispatcher>) -> Self {
        Self {
            client,
            queue,
            dispatcher,
        }
    }

    /// Create the processor with auto-completion disabled, wire the handlers,
    /// and run the receive loop until cancelled.
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), DispatchError> {
        let mut processor = self
            .client
            .create_processor(&self.queue, ProcessorOptions {
                auto_complete: false,
            });

        let dispatcher = Arc::clone(&self.dispatcher);
        processor.on_message(Box::new(move |event| {
            let dispatcher = Arc::clone(&dispatcher);
            Box::pin(async move { handle_message(&dispatcher, event).await })
        }));

        processor.on_error(Box::new(|event| {
            Box::pin(async move {
                tracing::error!(
                    context = %event.context,
                    error = %event.error,
                    "Error occurred while processing message"
                );
            })
        }));

        processor.start(cancel).await
    }
}

async fn handle_message(
    dispatcher: &NotificationDispatcher,
    event: MessageEvent,
) -> Result<(), DispatchError> {
    match serde_json::from_str::<NotificationRequest>(&event.envelope.body) {
        Ok(request) => {
            let outcome = dispatcher.dispatch(&request).await?;
            tracing::info!(
                envelope_id = %event.envelope.id,
                idempotence_key = %request.idempotence_key,
                outcome = %outcome,
                "Notification request handled"
            );
            event.complete().await
        }
        Err(error) => {
            tracing::warn!(
                envelope_id = %event.envelope.id,
                error = %error,
                "Malformed notification payload; completing without dispatch"
            );
            event.complete().await
        }
    }
}
