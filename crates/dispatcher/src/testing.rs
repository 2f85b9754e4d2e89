//! In-memory capability implementations for tests.
//!
//! Each fake records the calls made against it so tests can assert on
//! exactly how many sends, writes, and publishes a scenario produced.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;

use courier_common::error::DispatchError;
use courier_common::types::SmsMessage;

use crate::events::EventPublisher;
use crate::sms::SmsTransport;
use crate::store::IdempotenceStore;

struct Record {
    value: bool,
    ttl: Duration,
    expires_at: Instant,
}

/// Idempotence store over a `HashMap`, with real TTL expiry based on
/// `Instant` so expiry behavior is testable without waiting.
#[derive(Default)]
pub struct InMemoryIdempotenceStore {
    records: Mutex<HashMap<String, Record>>,
    writes: AtomicUsize,
    fail: AtomicBool,
}

impl InMemoryIdempotenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent operation return a store error.
    pub fn fail_all_operations(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    /// Whether an unexpired record exists for the key, truthy or not.
    pub fn contains(&self, key: &str) -> bool {
        self.records
            .lock()
            .unwrap()
            .get(key)
            .is_some_and(|r| r.expires_at > Instant::now())
    }

    /// TTL the record for `key` was written with, if the record exists.
    pub fn ttl_of(&self, key: &str) -> Option<Duration> {
        self.records.lock().unwrap().get(key).map(|r| r.ttl)
    }

    /// Number of record writes (`set` + successful `set_if_absent`).
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn reset_counts(&self) {
        self.writes.store(0, Ordering::SeqCst);
    }

    fn check_failure(&self) -> Result<(), DispatchError> {
        if self.fail.load(Ordering::SeqCst) {
            Err(DispatchError::Store("injected store failure".to_string()))
        } else {
            Ok(())
        }
    }

    fn expires_at(ttl: Duration) -> Instant {
        Instant::now() + ttl
    }
}

#[async_trait]
impl IdempotenceStore for InMemoryIdempotenceStore {
    async fn get(&self, key: &str) -> Result<bool, DispatchError> {
        self.check_failure()?;
        let records = self.records.lock().unwrap();
        Ok(records
            .get(key)
            .is_some_and(|r| r.value && r.expires_at > Instant::now()))
    }

    async fn set(&self, key: &str, value: bool, ttl: Duration) -> Result<(), DispatchError> {
        self.check_failure()?;
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.records.lock().unwrap().insert(
            key.to_string(),
            Record {
                value,
                ttl,
                expires_at: Self::expires_at(ttl),
            },
        );
        Ok(())
    }

    async fn set_if_absent(&self, key: &str, ttl: Duration) -> Result<bool, DispatchError> {
        self.check_failure()?;
        let mut records = self.records.lock().unwrap();
        if records
            .get(key)
            .is_some_and(|r| r.expires_at > Instant::now())
        {
            return Ok(false);
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        records.insert(
            key.to_string(),
            Record {
                value: true,
                ttl,
                expires_at: Self::expires_at(ttl),
            },
        );
        Ok(true)
    }

    async fn remove(&self, key: &str) -> Result<(), DispatchError> {
        self.check_failure()?;
        self.records.lock().unwrap().remove(key);
        Ok(())
    }
}

/// SMS transport that records every send and answers with a scripted outcome.
pub struct RecordingSmsTransport {
    sends: Mutex<Vec<SmsMessage>>,
    accept: AtomicBool,
    error: bool,
}

impl RecordingSmsTransport {
    /// Gateway accepts every message.
    pub fn accepting() -> Self {
        Self {
            sends: Mutex::new(Vec::new()),
            accept: AtomicBool::new(true),
            error: false,
        }
    }

    /// Gateway refuses every message (send returns `Ok(false)`).
    pub fn refusing() -> Self {
        Self {
            sends: Mutex::new(Vec::new()),
            accept: AtomicBool::new(false),
            error: false,
        }
    }

    /// Transport fails with an error before reaching the gateway.
    pub fn erroring() -> Self {
        Self {
            sends: Mutex::new(Vec::new()),
            accept: AtomicBool::new(false),
            error: true,
        }
    }

    /// Flip a refusing gateway to accepting, for retry scenarios.
    pub fn accept_from_now_on(&self) {
        self.accept.store(true, Ordering::SeqCst);
    }

    pub fn sends(&self) -> Vec<SmsMessage> {
        self.sends.lock().unwrap().clone()
    }
}

#[async_trait]
impl SmsTransport for RecordingSmsTransport {
    async fn send(&self, sms: &SmsMessage) -> Result<bool, DispatchError> {
        self.sends.lock().unwrap().push(sms.clone());
        if self.error {
            return Err(DispatchError::DeliveryFailed(
                "injected transport failure".to_string(),
            ));
        }
        Ok(self.accept.load(Ordering::SeqCst))
    }
}

/// Event publisher that records `(topic, payload)` pairs.
#[derive(Default)]
pub struct RecordingEventPublisher {
    published: Mutex<Vec<(String, String)>>,
    fail: AtomicBool,
}

impl RecordingEventPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent publish return a publish error.
    pub fn fail_all_operations(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    pub fn published(&self) -> Vec<(String, String)> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventPublisher for RecordingEventPublisher {
    async fn publish(&self, topic: &str, payload: &str) -> Result<(), DispatchError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(DispatchError::Publish(
                "injected publish failure".to_string(),
            ));
        }
        self.published
            .lock()
            .unwrap()
            .push((topic.to_string(), payload.to_string()));
        Ok(())
    }
}
