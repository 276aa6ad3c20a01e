use super::TraceSink;
use crate::capsule::Journey;
use std::sync::Arc;

/// Writes a one-line summary of each journey at info level, and the full
/// report as JSON at debug level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl LogSink {
    pub fn new() -> Self {
        Self
    }
}

impl TraceSink for LogSink {
    fn export(&self, journey: Arc<Journey>) {
        let mut journeys = 0usize;
        journey.walk(&mut |_| journeys += 1);

        tracing::info!(
            capsule = %journey.id(),
            label = %journey.label(),
            identity = %journey.identity(),
            status = ?journey.status(),
            duration_ms = ?journey.duration().map(|d| d.as_millis()),
            records = journey.record_count(),
            nested = journeys - 1,
            fault = ?journey.fault().map(|f| f.message),
            "Journey finished"
        );

        if tracing::enabled!(tracing::Level::DEBUG) {
            match serde_json::to_string(&journey.report()) {
                Ok(report) => tracing::debug!(capsule = %journey.id(), %report, "Journey report"),
                Err(e) => tracing::warn!(
                    capsule = %journey.id(),
                    "Failed to serialize journey report: {}",
                    e
                ),
            }
        }
    }

    fn export_fault(&self, message: &str) {
        tracing::warn!(fault = message, "Fault outside any journey");
    }
}
