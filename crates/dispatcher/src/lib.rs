//! Idempotent SMS notification dispatch.
//!
//! Consumes notification requests from a queue, deduplicates them by
//! idempotence key, forwards each unique request to the SMS gateway, and
//! publishes a confirmation event on success. Delivery is effectively-once:
//! at-least-once queue redelivery plus an atomic idempotence claim in the
//! store.

pub mod coordinator;
pub mod events;
pub mod handler;
pub mod sms;
pub mod store;
pub mod testing;
