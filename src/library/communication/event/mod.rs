//! Structures to realise an event-driven service architecture
//!
//! In an event driven world, services have no knowledge of each other.
//! Each service operates independently and during the operation, certain
//! events occur. For each of these (that are of relevance to other services)
//! an [`EventEnvelope`] is published into the stream of the service's bounded context
//! using a [`Publisher`].
//! Every interested party may then attach to that stream and process the events.
//! While processing, it is common that other events are triggered and thus further
//! envelopes published.
//!
//! Events are consumed in a reliable and resilient way using a concept called
//! [`ConsumerGroups`](ConsumerGroupDescriptor). Instead of using simple publish subscribe
//! between all connected services, envelopes are stored in an append-only, log-like data
//! structure where each [`StreamRecord`] is assigned a totally ordered [`MessageId`].
//!
//! Each record delivered to a group is handed to exactly one [`Consumer`] within that group
//! and stays *pending* for it until it is acknowledged. A consumer acknowledges a record only
//! after the [`Dispatcher`] routed it to a handler that succeeded (or when no handler is interested in it at all).
//! Upon crashing, the consumer resumes by first replaying its own pending records, thus
//! no record is left unprocessed. Handlers must therefore be idempotent.
//!
//! Multiple consumers may share a group. All participants in a group then collectively process
//! the stream where each record is assigned to only one consumer (effectively implementing load
//! balancing at the cost of a total processing order).

mod consumer;
mod consumer_group;
mod dispatcher;
mod envelope;
mod event_log;
mod publisher;
mod record;
mod stream;

pub use consumer::*;
pub use consumer_group::*;
pub use dispatcher::*;
pub use envelope::*;
pub use event_log::*;
pub use publisher::*;
pub use record::*;
pub use stream::*;
