//! The queue-processor contract: handler registration and the receive loop.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use courier_common::error::DispatchError;

use crate::envelope::Envelope;

/// Options passed when creating a processor.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessorOptions {
    /// When true, the processor completes an envelope itself after every
    /// message handler succeeds. The dispatcher always passes `false` so that
    /// completion stays an explicit decision of the arrival handler.
    pub auto_complete: bool,
}

/// Transport-side completion of a delivered envelope.
#[async_trait]
pub trait CompleteMessage: Send + Sync {
    async fn complete(&self, envelope: &Envelope) -> Result<(), DispatchError>;
}

/// A delivered envelope plus the handle to complete it.
#[derive(Clone)]
pub struct MessageEvent {
    pub envelope: Envelope,
    completer: Arc<dyn CompleteMessage>,
}

impl MessageEvent {
    pub fn new(envelope: Envelope, completer: Arc<dyn CompleteMessage>) -> Self {
        Self {
            envelope,
            completer,
        }
    }

    /// Acknowledge the envelope as done. One-way: a completed envelope is
    /// never redelivered.
    pub async fn complete(&self) -> Result<(), DispatchError> {
        self.completer.complete(&self.envelope).await
    }
}

/// A transport or processing fault surfaced to the error handlers.
///
/// Error handlers are observational only: they never alter completion state.
#[derive(Clone)]
pub struct ErrorEvent {
    /// What the processor was doing when the fault occurred.
    pub context: String,
    pub error: Arc<DispatchError>,
}

/// Handler invoked once per delivered envelope.
pub type MessageHandler =
    Box<dyn Fn(MessageEvent) -> BoxFuture<'static, Result<(), DispatchError>> + Send + Sync>;

/// Handler invoked when the transport or a message handler reports a fault.
pub type ErrorHandler = Box<dyn Fn(ErrorEvent) -> BoxFuture<'static, ()> + Send + Sync>;

/// Abstraction over a queue transport's receive loop.
///
/// Registered handlers are invoked in registration order; that order is part
/// of the contract. In practice a single message handler is registered.
#[async_trait]
pub trait QueueProcessor: Send + Sync {
    /// Register a handler invoked per delivered envelope.
    fn on_message(&mut self, handler: MessageHandler);

    /// Register a handler invoked on transport or processing faults.
    fn on_error(&mut self, handler: ErrorHandler);

    /// Run the receive loop until the token is cancelled or the transport is
    /// exhausted. Returns an error if no message handler was registered.
    ///
    /// In-flight handler invocations run to completion on cancellation; only
    /// the pull of new envelopes stops promptly.
    async fn start(&self, cancel: CancellationToken) -> Result<(), DispatchError>;
}

/// Capability that hands out processors for named queues.
pub trait QueueClient: Send + Sync {
    type Processor: QueueProcessor;

    fn create_processor(&self, queue: &str, options: ProcessorOptions) -> Self::Processor;
}

/// Invoke the message handlers in registration order.
///
/// Returns `true` if every handler succeeded. On the first failure the error
/// handlers are notified, remaining message handlers are skipped, and the
/// envelope is left for the transport to redeliver.
pub(crate) async fn deliver(
    handlers: &[MessageHandler],
    error_handlers: &[ErrorHandler],
    event: MessageEvent,
) -> bool {
    for handler in handlers {
        if let Err(error) = handler(event.clone()).await {
            tracing::warn!(
                envelope_id = %event.envelope.id,
                error = %error,
                "Message handler failed; envelope left uncompleted for redelivery"
            );
            raise_error(error_handlers, "processing message", error).await;
            return false;
        }
    }
    true
}

/// Invoke the error handlers in registration order.
pub(crate) async fn raise_error(
    error_handlers: &[ErrorHandler],
    context: &str,
    error: DispatchError,
) {
    let error = Arc::new(error);
    for handler in error_handlers {
        handler(ErrorEvent {
            context: context.to_string(),
            error: Arc::clone(&error),
        })
        .await;
    }
}
