//! Journey fault taxonomy.
//!
//! Stages and terminals raise a [`StageFault`]; the conduit records it on the
//! failing trace record and normalizes it into a single [`ConduitFault`] that
//! keeps the original cause chained.

use crate::capsule::{CapsuleId, TraceRecord};
use crate::shape::{EntityKind, Identity, Operation};
use conduit_shared::ConduitError;
use serde::Serialize;
use std::error::Error;
use std::fmt;
use thiserror::Error;

pub type BoxError = Box<dyn Error + Send + Sync + 'static>;

/// Result of a single stage or terminal phase.
pub type StageResult = Result<(), StageFault>;

/// Where in a journey a fault was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// The assembly could not resolve a conduit for the capsule's shape.
    Resolve,
    /// The capsule was not eligible to start a journey.
    Admission,
    Descend,
    Produce,
    Ascend,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Resolve => "resolve",
            Phase::Admission => "admission",
            Phase::Descend => "descend",
            Phase::Produce => "produce",
            Phase::Ascend => "ascend",
        };
        f.write_str(name)
    }
}

/// A fault raised by one phase of one stage or terminal.
#[derive(Debug, Error)]
pub enum StageFault {
    /// Descend precondition failed.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Capability predicate denied the caller.
    #[error("{identity} may not {operation} {entity}")]
    Authorization {
        identity: Identity,
        operation: Operation,
        entity: EntityKind,
    },

    /// The terminal could not produce a response.
    #[error("terminal failed")]
    Terminal(#[source] BoxError),

    /// An ascend phase rejected or failed to process the response.
    #[error("post-processing failed")]
    PostProcessing(#[source] BoxError),

    /// A child journey spawned during this phase failed.
    #[error("nested journey failed")]
    Nested(#[source] Box<ConduitFault>),

    #[error(transparent)]
    Engine(#[from] ConduitError),
}

impl StageFault {
    pub fn validation(message: impl Into<String>) -> Self {
        StageFault::Validation(message.into())
    }

    pub fn denied(identity: &Identity, operation: Operation, entity: EntityKind) -> Self {
        StageFault::Authorization {
            identity: identity.clone(),
            operation,
            entity,
        }
    }

    pub fn terminal(cause: impl Into<BoxError>) -> Self {
        StageFault::Terminal(cause.into())
    }

    pub fn post_processing(cause: impl Into<BoxError>) -> Self {
        StageFault::PostProcessing(cause.into())
    }

    pub fn is_authorization(&self) -> bool {
        matches!(self, StageFault::Authorization { .. })
    }
}

impl From<ConduitFault> for StageFault {
    fn from(fault: ConduitFault) -> Self {
        StageFault::Nested(Box::new(fault))
    }
}

/// Cloneable description of a fault, kept on the capsule and in exports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FaultSummary {
    pub phase: Phase,
    pub location: String,
    pub message: String,
}

/// The single error type a journey reports to its caller.
#[derive(Debug, Error)]
#[error("{phase} failed at `{location}` for capsule {capsule}")]
pub struct ConduitFault {
    capsule: CapsuleId,
    phase: Phase,
    location: String,
    #[source]
    cause: StageFault,
    records: Vec<TraceRecord>,
}

impl ConduitFault {
    pub(crate) fn new(
        capsule: CapsuleId,
        phase: Phase,
        location: impl Into<String>,
        cause: StageFault,
        records: Vec<TraceRecord>,
    ) -> Self {
        Self {
            capsule,
            phase,
            location: location.into(),
            cause,
            records,
        }
    }

    pub fn capsule_id(&self) -> CapsuleId {
        self.capsule
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Description of the stage or terminal that raised the fault.
    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn cause(&self) -> &StageFault {
        &self.cause
    }

    pub fn into_cause(self) -> StageFault {
        self.cause
    }

    /// Trace records accumulated up to and including the failing phase.
    pub fn records(&self) -> &[TraceRecord] {
        &self.records
    }

    /// Innermost stage fault, following nested journeys down.
    pub fn root_cause(&self) -> &StageFault {
        match &self.cause {
            StageFault::Nested(inner) => inner.root_cause(),
            other => other,
        }
    }

    pub fn is_authorization(&self) -> bool {
        self.root_cause().is_authorization()
    }

    pub fn summary(&self) -> FaultSummary {
        FaultSummary {
            phase: self.phase,
            location: self.location.clone(),
            message: error_chain(&self.cause),
        }
    }
}

/// Render an error and all of its sources as `outer: inner: innermost`.
pub fn error_chain(err: &(dyn Error + 'static)) -> String {
    let mut rendered = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        rendered.push_str(": ");
        rendered.push_str(&cause.to_string());
        source = cause.source();
    }
    rendered
}
