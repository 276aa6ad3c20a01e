//! Type-erased trace of one capsule journey.
//!
//! A [`Journey`] is the part of a capsule that outlives its typed payloads:
//! identity, timings, status, trace records and the child journeys spawned
//! during its phases. Parents own their children; children hold only a weak
//! pointer back, so the graph stays a tree.

use super::id::{CapsuleId, RecordRef};
use super::record::{Direction, RecordKind, TraceRecord};
use crate::fault::FaultSummary;
use crate::pipeline::JourneyMetrics;
use crate::shape::{EntityKind, Identity, Operation};
use chrono::{DateTime, Utc};
use conduit_shared::{ConduitError, ConduitResult};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

/// Lifecycle of a journey.
///
/// ```text
/// Idle ──send──▶ InFlight ──▶ Complete
///                         └──▶ Aborted
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JourneyStatus {
    Idle,
    InFlight,
    Complete,
    Aborted,
}

impl JourneyStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JourneyStatus::Complete | JourneyStatus::Aborted)
    }
}

#[derive(Debug)]
struct Lifecycle {
    status: JourneyStatus,
    completed_at: Option<DateTime<Utc>>,
    duration: Option<Duration>,
    fault: Option<FaultSummary>,
}

#[derive(Debug)]
pub struct Journey {
    id: CapsuleId,
    parent_id: Option<CapsuleId>,
    caused_by: Option<RecordRef>,
    operation: Operation,
    entity: EntityKind,
    identity: Identity,
    depth: usize,
    started_at: DateTime<Utc>,
    started: Instant,
    parent: Weak<Journey>,
    lifecycle: Mutex<Lifecycle>,
    records: Mutex<Vec<TraceRecord>>,
    children: Mutex<Vec<Arc<Journey>>>,
}

impl Journey {
    pub(crate) fn root(operation: Operation, entity: EntityKind, identity: Identity) -> Arc<Self> {
        Arc::new(Self::build(operation, entity, identity, None, 0, Weak::new()))
    }

    /// Create a child journey and attach it to `parent`.
    ///
    /// The parent must be in flight: a child can only be spawned by a phase
    /// of a journey that is still on the open call stack.
    pub(crate) fn child(
        parent: &Arc<Journey>,
        caused_by: RecordRef,
        operation: Operation,
        entity: EntityKind,
    ) -> ConduitResult<Arc<Self>> {
        if parent.status() != JourneyStatus::InFlight {
            return Err(ConduitError::InvalidState(format!(
                "capsule {} is {:?}; only an in-flight capsule can spawn children",
                parent.id,
                parent.status()
            )));
        }

        let child = Arc::new(Self::build(
            operation,
            entity,
            parent.identity.clone(),
            Some(caused_by),
            parent.depth + 1,
            Arc::downgrade(parent),
        ));

        parent.children.lock().push(Arc::clone(&child));

        tracing::trace!(
            parent = %parent.id.short(),
            child = %child.id.short(),
            caused_by = %caused_by,
            "Spawned child capsule"
        );

        Ok(child)
    }

    fn build(
        operation: Operation,
        entity: EntityKind,
        identity: Identity,
        caused_by: Option<RecordRef>,
        depth: usize,
        parent: Weak<Journey>,
    ) -> Self {
        Self {
            id: CapsuleId::new(),
            parent_id: parent.upgrade().map(|p| p.id),
            caused_by,
            operation,
            entity,
            identity,
            depth,
            started_at: Utc::now(),
            started: Instant::now(),
            parent,
            lifecycle: Mutex::new(Lifecycle {
                status: JourneyStatus::Idle,
                completed_at: None,
                duration: None,
                fault: None,
            }),
            records: Mutex::new(Vec::new()),
            children: Mutex::new(Vec::new()),
        }
    }

    pub fn id(&self) -> CapsuleId {
        self.id
    }

    pub fn parent_id(&self) -> Option<CapsuleId> {
        self.parent_id
    }

    /// The owning journey, if it is still alive.
    pub fn parent(&self) -> Option<Arc<Journey>> {
        self.parent.upgrade()
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// The parent record during whose phase this journey was spawned.
    pub fn caused_by(&self) -> Option<RecordRef> {
        self.caused_by
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn entity(&self) -> EntityKind {
        self.entity
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn label(&self) -> String {
        format!("{} {}", self.operation, self.entity)
    }

    /// Nesting depth; roots are at depth 0.
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.lifecycle.lock().completed_at
    }

    pub fn duration(&self) -> Option<Duration> {
        self.lifecycle.lock().duration
    }

    pub fn status(&self) -> JourneyStatus {
        self.lifecycle.lock().status
    }

    pub fn fault(&self) -> Option<FaultSummary> {
        self.lifecycle.lock().fault.clone()
    }

    /// Snapshot of the trace records written so far.
    pub fn records(&self) -> Vec<TraceRecord> {
        self.records.lock().clone()
    }

    pub fn record_count(&self) -> usize {
        self.records.lock().len()
    }

    pub fn children(&self) -> Vec<Arc<Journey>> {
        self.children.lock().clone()
    }

    /// Visit this journey and every descendant, depth first.
    pub fn walk(&self, visit: &mut impl FnMut(&Journey)) {
        visit(self);
        for child in self.children() {
            child.walk(visit);
        }
    }

    pub fn metrics(&self) -> JourneyMetrics {
        JourneyMetrics::from_journey(self)
    }

    /// Serializable snapshot of this journey and all of its descendants.
    pub fn report(&self) -> JourneyReport {
        let lifecycle = self.lifecycle.lock();
        let (status, completed_at, duration, fault) = (
            lifecycle.status,
            lifecycle.completed_at,
            lifecycle.duration,
            lifecycle.fault.clone(),
        );
        drop(lifecycle);

        JourneyReport {
            id: self.id,
            parent_id: self.parent_id,
            caused_by: self.caused_by,
            label: self.label(),
            identity: self.identity.clone(),
            status,
            started_at: self.started_at,
            completed_at,
            duration_ms: duration.map(|d| d.as_millis()),
            fault,
            records: self.records(),
            children: self.children().iter().map(|c| c.report()).collect(),
        }
    }

    pub(crate) fn begin(&self) -> ConduitResult<()> {
        let mut lifecycle = self.lifecycle.lock();
        if lifecycle.status != JourneyStatus::Idle {
            return Err(ConduitError::InvalidState(format!(
                "capsule {} has already been sent ({:?})",
                self.id, lifecycle.status
            )));
        }
        lifecycle.status = JourneyStatus::InFlight;
        Ok(())
    }

    pub(crate) fn set_fault(&self, fault: FaultSummary) -> ConduitResult<()> {
        let mut lifecycle = self.lifecycle.lock();
        if lifecycle.fault.is_some() {
            return Err(ConduitError::InvalidState(format!(
                "capsule {} already holds a fault",
                self.id
            )));
        }
        lifecycle.fault = Some(fault);
        Ok(())
    }

    pub(crate) fn has_fault(&self) -> bool {
        self.lifecycle.lock().fault.is_some()
    }

    pub(crate) fn finish(&self, status: JourneyStatus) -> ConduitResult<()> {
        let mut lifecycle = self.lifecycle.lock();
        if lifecycle.status.is_terminal() {
            return Err(ConduitError::InvalidState(format!(
                "capsule {} already reached {:?}",
                self.id, lifecycle.status
            )));
        }
        lifecycle.status = status;
        lifecycle.completed_at = Some(Utc::now());
        lifecycle.duration = Some(self.started.elapsed());
        Ok(())
    }

    /// Reserve the next trace slot and return the open record for it.
    pub(crate) fn open_record(
        &self,
        stage: &str,
        direction: Direction,
        kind: RecordKind,
    ) -> TraceRecord {
        let mut records = self.records.lock();
        let now = Utc::now();
        let started_at = match records.last() {
            Some(last) if last.started_at() > now => last.started_at(),
            _ => now,
        };
        let reference = RecordRef {
            capsule: self.id,
            index: records.len(),
        };
        let description = format!("{} ({} {})", stage, self.label(), self.id.short());
        let record = TraceRecord::open(
            reference,
            stage,
            description,
            direction,
            kind,
            started_at,
            self.caused_by,
        );
        records.push(record.clone());
        record
    }

    /// Write a finished record back into its reserved slot.
    pub(crate) fn close_record(&self, record: &TraceRecord) {
        let mut records = self.records.lock();
        match records.get_mut(record.reference().index) {
            Some(slot) => *slot = record.clone(),
            None => tracing::warn!(
                capsule = %self.id.short(),
                record = %record.reference(),
                "Closing a record that was never opened"
            ),
        }
    }
}

/// Serializable snapshot of a journey tree.
#[derive(Debug, Clone, Serialize)]
pub struct JourneyReport {
    pub id: CapsuleId,
    pub parent_id: Option<CapsuleId>,
    pub caused_by: Option<RecordRef>,
    pub label: String,
    pub identity: Identity,
    pub status: JourneyStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<u128>,
    pub fault: Option<FaultSummary>,
    pub records: Vec<TraceRecord>,
    pub children: Vec<JourneyReport>,
}
