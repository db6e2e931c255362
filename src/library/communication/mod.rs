//! Structures to distribute domain events between services in a distributed system
//!
//! Services communicate by publishing self-describing [`EventEnvelopes`](event::EventEnvelope)
//! into append-only, ordered streams. Every interested party may then attach to a stream as a member
//! of a named consumer group and process the events in a reliable, at-least-once fashion.
//! For more details and a more in-depth explanation, consult the [`event`] module.
//!
//! The transport is abstracted by the [`EventLog`](event::EventLog) trait. Implementations
//! backed by third-party systems live in the [`implementation`] module.

mod communication_factory;
mod error;

pub mod event;
pub mod implementation;

pub use communication_factory::*;
pub use error::*;
