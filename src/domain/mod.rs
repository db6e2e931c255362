//! Restaurant specific structures: the stream topology and the closed catalog of domain events
//!
//! Each bounded context (menu, order, kitchen, reservation, inventory) publishes its events
//! into exactly one stream. Other contexts may attach to that stream through a consumer group.
//! Stream names and event types are process-wide constants shared by producers and consumers.

pub mod event;
pub mod stream;
