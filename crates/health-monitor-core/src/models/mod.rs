//! Domain models for the health monitor.

mod patient;

pub use patient::*;
