use crate::capsule::{Direction, Journey, RecordKind};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct PhaseMetrics {
    pub stage: String,
    pub direction: Direction,
    pub kind: RecordKind,
    /// `None` while the phase is still open.
    pub duration_ms: Option<u128>,
}

/// Timing breakdown of one journey, derived from its trace records.
#[derive(Debug, Clone, Serialize)]
pub struct JourneyMetrics {
    pub total_duration_ms: Option<u128>,
    pub phases: Vec<PhaseMetrics>,
    pub children: usize,
}

impl JourneyMetrics {
    pub(crate) fn from_journey(journey: &Journey) -> Self {
        let phases = journey
            .records()
            .iter()
            .map(|record| PhaseMetrics {
                stage: record.stage().to_string(),
                direction: record.direction(),
                kind: record.kind(),
                duration_ms: record.duration_ms(),
            })
            .collect();

        Self {
            total_duration_ms: journey.duration().map(|d| d.as_millis()),
            phases,
            children: journey.children().len(),
        }
    }

    pub fn phase_duration_ms(&self, stage: &str, direction: Direction) -> Option<u128> {
        self.phases
            .iter()
            .find(|phase| phase.stage == stage && phase.direction == direction)
            .and_then(|phase| phase.duration_ms)
    }

    /// Time spent in `stage` across both directions.
    pub fn stage_duration_ms(&self, stage: &str) -> Option<u128> {
        let durations: Vec<u128> = self
            .phases
            .iter()
            .filter(|phase| phase.stage == stage)
            .filter_map(|phase| phase.duration_ms)
            .collect();
        (!durations.is_empty()).then(|| durations.iter().sum())
    }
}
