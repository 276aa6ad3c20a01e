use super::TraceSink;
use crate::capsule::Journey;
use parking_lot::Mutex;
use std::sync::Arc;

/// Keeps exported journeys and faults in memory until cleared.
#[derive(Debug, Default)]
pub struct MemorySink {
    journeys: Mutex<Vec<Arc<Journey>>>,
    faults: Mutex<Vec<String>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Exported journeys in export order.
    pub fn journeys(&self) -> Vec<Arc<Journey>> {
        self.journeys.lock().clone()
    }

    pub fn faults(&self) -> Vec<String> {
        self.faults.lock().clone()
    }

    pub fn export_count(&self) -> usize {
        self.journeys.lock().len()
    }

    pub fn clear(&self) {
        self.journeys.lock().clear();
        self.faults.lock().clear();
    }
}

impl TraceSink for MemorySink {
    fn export(&self, journey: Arc<Journey>) {
        self.journeys.lock().push(journey);
    }

    fn export_fault(&self, message: &str) {
        self.faults.lock().push(message.to_string());
    }
}
