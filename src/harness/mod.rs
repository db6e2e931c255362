//! Lifecycle harness to run event driven services as part of a process
//!
//! A [`Module`] is executed by the [`ModuleRunner`] which wires it up, keeps it alive until its
//! [`Heart`] dies (usually due to SIGINT or SIGTERM) and winds it down within a bounded amount of time.

mod heart;
mod module;
mod redis;
mod service;

pub use self::redis::*;
pub use heart::*;
pub use module::*;
pub use service::*;
