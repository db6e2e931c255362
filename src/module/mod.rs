//! Runnable modules each bundling a service with its configuration, plus operator tools

pub mod options;
pub mod tools;

pub mod kitchen;
pub mod menu;
