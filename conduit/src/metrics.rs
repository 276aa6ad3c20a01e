//! Assembly-wide counters.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Lock-free counters shared by every conduit of one assembly.
#[derive(Debug, Default)]
pub(crate) struct AssemblyMetricsStorage {
    pub(crate) journeys_started: AtomicU64,
    pub(crate) journeys_completed: AtomicU64,
    pub(crate) journeys_aborted: AtomicU64,
    pub(crate) short_circuits: AtomicU64,
    pub(crate) exports: AtomicU64,
    pub(crate) sink_failures: AtomicU64,
    pub(crate) out_of_journey_faults: AtomicU64,
}

impl AssemblyMetricsStorage {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_started(&self) {
        self.journeys_started.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_completed(&self, short_circuited: bool) {
        self.journeys_completed.fetch_add(1, Ordering::Relaxed);
        if short_circuited {
            self.short_circuits.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_aborted(&self) {
        self.journeys_aborted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> AssemblyMetrics {
        AssemblyMetrics {
            journeys_started: self.journeys_started.load(Ordering::Relaxed),
            journeys_completed: self.journeys_completed.load(Ordering::Relaxed),
            journeys_aborted: self.journeys_aborted.load(Ordering::Relaxed),
            short_circuits: self.short_circuits.load(Ordering::Relaxed),
            exports: self.exports.load(Ordering::Relaxed),
            sink_failures: self.sink_failures.load(Ordering::Relaxed),
            out_of_journey_faults: self.out_of_journey_faults.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of an assembly's counters.
///
/// All counters are monotonic; they never reset for the life of the assembly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AssemblyMetrics {
    journeys_started: u64,
    journeys_completed: u64,
    journeys_aborted: u64,
    short_circuits: u64,
    exports: u64,
    sink_failures: u64,
    out_of_journey_faults: u64,
}

impl AssemblyMetrics {
    /// Journeys admitted, root and nested.
    pub fn journeys_started_total(&self) -> u64 {
        self.journeys_started
    }

    pub fn journeys_completed_total(&self) -> u64 {
        self.journeys_completed
    }

    pub fn journeys_aborted_total(&self) -> u64 {
        self.journeys_aborted
    }

    /// Completed journeys whose response came from a stage, not the terminal.
    pub fn short_circuits_total(&self) -> u64 {
        self.short_circuits
    }

    pub fn exports_total(&self) -> u64 {
        self.exports
    }

    /// Exports that panicked inside the sink.
    pub fn sink_failures_total(&self) -> u64 {
        self.sink_failures
    }

    pub fn out_of_journey_faults_total(&self) -> u64 {
        self.out_of_journey_faults
    }

    /// Journeys admitted but not yet complete or aborted.
    pub fn in_flight(&self) -> u64 {
        self.journeys_started
            .saturating_sub(self.journeys_completed + self.journeys_aborted)
    }
}
