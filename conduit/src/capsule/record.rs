//! Trace records: one entry per phase visit.

use super::id::RecordRef;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::time::{Duration, Instant};

/// Which half of the journey a record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Descending,
    Ascending,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Descending => f.write_str("descending"),
            Direction::Ascending => f.write_str("ascending"),
        }
    }
}

/// What kind of participant produced a record.
///
/// The terminal's single phase is recorded as [`Direction::Descending`]
/// with kind [`RecordKind::Terminal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Stage,
    Terminal,
}

/// One phase-visit log entry.
///
/// Records are opened when a phase starts and closed when it returns. A record
/// whose `duration` is `None` belongs to a phase that never completed.
#[derive(Debug, Clone, Serialize)]
pub struct TraceRecord {
    reference: RecordRef,
    stage: String,
    description: String,
    direction: Direction,
    kind: RecordKind,
    started_at: DateTime<Utc>,
    #[serde(skip)]
    started: Instant,
    duration: Option<Duration>,
    messages: Vec<String>,
    fault: Option<String>,
    causing_record: Option<RecordRef>,
}

impl TraceRecord {
    pub(crate) fn open(
        reference: RecordRef,
        stage: &str,
        description: String,
        direction: Direction,
        kind: RecordKind,
        started_at: DateTime<Utc>,
        causing_record: Option<RecordRef>,
    ) -> Self {
        Self {
            reference,
            stage: stage.to_string(),
            description,
            direction,
            kind,
            started_at,
            started: Instant::now(),
            duration: None,
            messages: Vec::new(),
            fault: None,
            causing_record,
        }
    }

    /// Attach a free-text note to this phase visit.
    pub fn log(&mut self, message: impl Into<String>) {
        self.messages.push(message.into());
    }

    pub(crate) fn close(&mut self) {
        self.duration = Some(self.started.elapsed());
    }

    pub(crate) fn fail(&mut self, fault: String) {
        self.close();
        self.fault = Some(fault);
    }

    /// Where this record sits: owning capsule and position in its trace.
    pub fn reference(&self) -> RecordRef {
        self.reference
    }

    /// Name of the stage or terminal that ran this phase.
    pub fn stage(&self) -> &str {
        &self.stage
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }

    pub fn duration_ms(&self) -> Option<u128> {
        self.duration.map(|d| d.as_millis())
    }

    pub fn is_open(&self) -> bool {
        self.duration.is_none()
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    pub fn fault(&self) -> Option<&str> {
        self.fault.as_deref()
    }

    /// The parent's record during whose phase this capsule was spawned.
    pub fn causing_record(&self) -> Option<RecordRef> {
        self.causing_record
    }
}
