//! Capsules: the payload and trace carrier for one request journey.
//!
//! ## Architecture
//!
//! ```text
//! Capsule<S>  ── typed half: request (down), response (up)
//!     │
//!     └── Arc<Journey> ── erased half: ids, timings, status, fault,
//!                         trace records, children (owned), parent (weak)
//! ```
//!
//! The typed half is exclusively borrowed by the conduit for the whole
//! journey. The erased half is shared so a parent's export can walk the
//! journeys of every capsule spawned beneath it.

mod id;
mod journey;
mod record;

pub use id::{CapsuleId, RecordRef};
pub use journey::{Journey, JourneyReport, JourneyStatus};
pub use record::{Direction, RecordKind, TraceRecord};

use crate::fault::FaultSummary;
use crate::pipeline::JourneyMetrics;
use crate::shape::{EntityKind, Identity, Operation, Shape};
use chrono::{DateTime, Utc};
use conduit_shared::{ConduitError, ConduitResult};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Payload/trace carrier for one journey of shape `S`.
pub struct Capsule<S: Shape> {
    journey: Arc<Journey>,
    request: S::Request,
    response: Option<S::Response>,
}

impl<S: Shape> Capsule<S> {
    /// Create a root capsule for an anonymous caller.
    pub fn new(request: S::Request) -> Self {
        Self::for_identity(Identity::Anonymous, request)
    }

    /// Create a root capsule on behalf of `identity`.
    pub fn for_identity(identity: Identity, request: S::Request) -> Self {
        Self {
            journey: Journey::root(S::OPERATION, S::ENTITY, identity),
            request,
            response: None,
        }
    }

    /// Spawn a child capsule from inside one of this capsule's phases.
    ///
    /// `record` must be the open record of the phase doing the spawning; it
    /// becomes the child's causing record. The child inherits this capsule's
    /// identity and is attached to its children for trace export.
    pub fn spawn<C: Shape>(
        &self,
        record: &TraceRecord,
        request: C::Request,
    ) -> ConduitResult<Capsule<C>> {
        let cause = record.reference();
        if cause.capsule != self.id() || !record.is_open() {
            return Err(ConduitError::InvalidArgument(format!(
                "record {} is not an open phase of capsule {}",
                cause,
                self.id()
            )));
        }

        let journey = Journey::child(&self.journey, cause, C::OPERATION, C::ENTITY)?;
        Ok(Capsule {
            journey,
            request,
            response: None,
        })
    }

    pub fn id(&self) -> CapsuleId {
        self.journey.id()
    }

    pub fn parent_id(&self) -> Option<CapsuleId> {
        self.journey.parent_id()
    }

    /// Journey of the capsule that spawned this one, if still alive.
    pub fn parent(&self) -> Option<Arc<Journey>> {
        self.journey.parent()
    }

    pub fn is_root(&self) -> bool {
        self.journey.is_root()
    }

    pub fn operation(&self) -> Operation {
        S::OPERATION
    }

    pub fn entity(&self) -> EntityKind {
        S::ENTITY
    }

    pub fn identity(&self) -> &Identity {
        self.journey.identity()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.journey.started_at()
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.journey.completed_at()
    }

    pub fn duration(&self) -> Option<Duration> {
        self.journey.duration()
    }

    pub fn status(&self) -> JourneyStatus {
        self.journey.status()
    }

    pub fn fault(&self) -> Option<FaultSummary> {
        self.journey.fault()
    }

    pub fn records(&self) -> Vec<TraceRecord> {
        self.journey.records()
    }

    pub fn children(&self) -> Vec<Arc<Journey>> {
        self.journey.children()
    }

    pub fn journey(&self) -> &Arc<Journey> {
        &self.journey
    }

    pub fn metrics(&self) -> JourneyMetrics {
        self.journey.metrics()
    }

    pub fn request(&self) -> &S::Request {
        &self.request
    }

    pub fn request_mut(&mut self) -> &mut S::Request {
        &mut self.request
    }

    pub fn response(&self) -> Option<&S::Response> {
        self.response.as_ref()
    }

    /// Mutable access for ascend phases rewriting the result.
    pub fn response_mut(&mut self) -> Option<&mut S::Response> {
        self.response.as_mut()
    }

    pub fn has_response(&self) -> bool {
        self.response.is_some()
    }

    /// Set the ascent result.
    ///
    /// Single assignment: fails if a response or a fault is already set.
    pub fn set_response(&mut self, value: S::Response) -> ConduitResult<()> {
        if self.response.is_some() {
            return Err(ConduitError::InvalidState(format!(
                "capsule {} already holds a response",
                self.id()
            )));
        }
        if self.journey.has_fault() {
            return Err(ConduitError::InvalidState(format!(
                "capsule {} already holds a fault",
                self.id()
            )));
        }
        self.response = Some(value);
        Ok(())
    }

    /// Set the terminal fault.
    ///
    /// Only the engine records faults; stages and terminals raise a
    /// [`crate::StageFault`] instead. Single assignment: fails if a fault or
    /// a response is already set.
    pub(crate) fn set_fault(&mut self, fault: FaultSummary) -> ConduitResult<()> {
        if self.response.is_some() {
            return Err(ConduitError::InvalidState(format!(
                "capsule {} already holds a response",
                self.id()
            )));
        }
        self.journey.set_fault(fault)
    }

    pub fn into_response(self) -> Option<S::Response> {
        self.response
    }

    /// Drop a pending response so an abort leaves only the fault behind.
    pub(crate) fn discard_response(&mut self) -> Option<S::Response> {
        self.response.take()
    }
}

impl<S: Shape> fmt::Debug for Capsule<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capsule")
            .field("id", &self.id())
            .field("shape", &S::label())
            .field("status", &self.status())
            .field("has_response", &self.has_response())
            .finish()
    }
}

/// The view of a capsule shared by every shape.
///
/// Stages written against this view (see [`crate::GenericStage`]) serve all
/// operations and entities with a single instance.
pub trait Envelope: Send + Sync {
    fn id(&self) -> CapsuleId;
    fn operation(&self) -> Operation;
    fn entity(&self) -> EntityKind;
    fn identity(&self) -> &Identity;
    fn journey(&self) -> &Arc<Journey>;
    fn has_response(&self) -> bool;
}

impl<S: Shape> Envelope for Capsule<S> {
    fn id(&self) -> CapsuleId {
        Capsule::id(self)
    }

    fn operation(&self) -> Operation {
        S::OPERATION
    }

    fn entity(&self) -> EntityKind {
        S::ENTITY
    }

    fn identity(&self) -> &Identity {
        Capsule::identity(self)
    }

    fn journey(&self) -> &Arc<Journey> {
        Capsule::journey(self)
    }

    fn has_response(&self) -> bool {
        Capsule::has_response(self)
    }
}
