//! Implementations of the [`EventLog`](super::event::EventLog) trait

pub mod memory;
pub mod redis;
