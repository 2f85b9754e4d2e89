//! Queue-processor abstraction decoupling consumers from the queue transport.
//!
//! A [`processor::QueueProcessor`] exposes two subscription points (message
//! arrival and transport faults) and a `start` loop that pulls envelopes until
//! cancelled. Completion is always explicit: a failed arrival handler leaves
//! the envelope uncompleted so the transport redelivers it.
//!
//! Two transports are provided: a Redis reliable-list transport for
//! production ([`redis_queue`]) and an in-memory transport for tests
//! ([`memory`]).

pub mod envelope;
pub mod memory;
pub mod processor;
pub mod redis_queue;
