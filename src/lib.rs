//! This library crate contains everything needed to move domain events between the restaurant services.
//!
//! Submodules have been introduced to split responsibilities. They form a chain of dependencies from the
//! project agnostic event bus in [`library`], over the restaurant specific stream and event catalog in [`domain`],
//! through the lifecycle [`harness`], up to the runnable service [`modules`](module) and their event handlers.

#![warn(missing_docs)]

pub mod constants;
pub mod domain;
pub mod harness;
pub mod library;
pub mod module;
