//! Destinations for completed journeys.
//!
//! An assembly hands every finished root capsule to its [`TraceSink`] exactly
//! once, with the whole nested journey tree attached. Nested capsules are
//! never exported on their own; they reach the sink through their root's
//! [`Journey::children`].

mod log;
mod memory;

pub use log::LogSink;
pub use memory::MemorySink;

use crate::capsule::Journey;
use std::sync::Arc;

/// Receives completed root journeys and faults raised outside any journey.
///
/// Implementations must not fail the caller: errors are handled inside the
/// sink. A panic is caught by the assembly, counted and logged.
pub trait TraceSink: Send + Sync {
    /// Called once per completed or aborted root journey.
    fn export(&self, journey: Arc<Journey>);

    /// Called for faults that happen before a journey exists.
    fn export_fault(&self, message: &str);
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl TraceSink for NoopSink {
    fn export(&self, _journey: Arc<Journey>) {}

    fn export_fault(&self, _message: &str) {}
}
