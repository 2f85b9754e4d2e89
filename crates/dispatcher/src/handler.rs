//! Idempotent notification dispatch.
//!
//! Guarantees at most one SMS per idempotence key within the record TTL,
//! despite at-least-once queue delivery:
//!
//! 1. An existing truthy record means the key was already handled — skip.
//! 2. Otherwise atomically claim the key (`set_if_absent`). Losing the claim
//!    means a concurrent delivery of the same key is handling it — skip.
//!    The claim closes the check-then-act race a plain get+set would have.
//! 3. Send the SMS. On failure, release the claim and fail the operation so
//!    the caller leaves the source envelope uncompleted and the queue
//!    redelivers it. No local retry loop.
//! 4. Publish the confirmation event. A publish failure propagates; on
//!    redelivery the record is found in step 1 and the envelope completes
//!    without a duplicate send.
//!
//! A crash between steps 2 and 3 suppresses the notification until the TTL
//! lapses; that window replaces the duplicate-send window a non-atomic
//! check would have.

use std::sync::Arc;
use std::time::Duration;

use courier_common::error::DispatchError;
use courier_common::types::{DispatchOutcome, NotificationRequest, SmsMessage};

use crate::events::{EventPublisher, SMS_SENT_CONFIRMATION, SMS_SENT_TOPIC};
use crate::sms::SmsTransport;
use crate::store::IdempotenceStore;

pub struct NotificationDispatcher {
    store: Arc<dyn IdempotenceStore>,
    sms: Arc<dyn SmsTransport>,
    events: Arc<dyn EventPublisher>,
    record_ttl: Duration,
}

impl NotificationDispatcher {
    pub fn new(
        store: Arc<dyn IdempotenceStore>,
        sms: Arc<dyn SmsTransport>,
        events: Arc<dyn EventPublisher>,
        record_ttl: Duration,
    ) -> Self {
        Self {
            store,
            sms,
            events,
            record_ttl,
        }
    }

    /// Handle one notification request.
    ///
    /// Any `Err` must leave the source envelope uncompleted; retry is
    /// delegated entirely to queue redelivery.
    pub async fn dispatch(
        &self,
        request: &NotificationRequest,
    ) -> Result<DispatchOutcome, DispatchError> {
        let key = request.idempotence_key.to_string();

        if self.store.get(&key).await? {
            tracing::debug!(idempotence_key = %key, "Notification already handled, skipping");
            return Ok(DispatchOutcome::AlreadyHandled);
        }

        if !self.store.set_if_absent(&key, self.record_ttl).await? {
            tracing::debug!(
                idempotence_key = %key,
                "Idempotence claim held by a concurrent delivery, skipping"
            );
            return Ok(DispatchOutcome::AlreadyHandled);
        }

        let sent = match self.sms.send(&SmsMessage::from(request)).await {
            Ok(sent) => sent,
            Err(error) => {
                self.store.remove(&key).await?;
                return Err(error);
            }
        };

        if !sent {
            self.store.remove(&key).await?;
            return Err(DispatchError::DeliveryFailed(format!(
                "SMS gateway refused message for key {}",
                key
            )));
        }

        self.events
            .publish(SMS_SENT_TOPIC, SMS_SENT_CONFIRMATION)
            .await?;

        tracing::info!(
            idempotence_key = %key,
            phone_number = %request.phone_number,
            "SMS dispatched"
        );
        Ok(DispatchOutcome::Sent)
    }
}
