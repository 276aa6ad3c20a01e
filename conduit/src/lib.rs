//! Conduit: a two-phase request pipeline engine with hierarchical tracing.
//!
//! For every kind of request (a [`Shape`]), an [`Assembly`] composes the
//! stages its layers declare into a [`Conduit`], drives a [`Capsule`] down
//! through them to a [`Terminal`] and back up, and records a timed trace of
//! the whole journey, including journeys spawned while it was in flight.
//!
//! ```text
//! caller ─▶ Assembly::conduit::<S>() ─▶ Conduit::send(&mut capsule)
//!                                         │  s1.descend … sn.descend
//!                                         │  terminal.produce
//!                                         │  sn.ascend … s1.ascend
//!                                         ▼
//!                      response or ConduitFault; root journeys → TraceSink
//! ```

pub mod assembly;
pub mod capsule;
pub mod factory;
pub mod fault;
pub mod layer;
pub mod logging;
pub mod metrics;
pub mod options;
pub mod pipeline;
pub mod shape;
pub mod stages;
pub mod trace;

pub use assembly::{Assembly, AssemblyBuilder};
pub use capsule::{
    Capsule, CapsuleId, Direction, Envelope, Journey, JourneyReport, JourneyStatus, RecordKind,
    RecordRef, TraceRecord,
};
pub use factory::{FactoryError, RequestFactories};
pub use fault::{BoxError, ConduitFault, FaultSummary, Phase, StageFault, StageResult, error_chain};
pub use layer::{Capabilities, GenericStage, Layer, Stage, Terminal};
pub use logging::init_logging;
pub use metrics::AssemblyMetrics;
pub use options::{AssemblyOptions, CacheOptions, LoggingOptions};
pub use pipeline::{Conduit, JourneyMetrics, PhaseMetrics};
pub use shape::{EntityKind, Identity, Operation, Shape};
pub use stages::{Authorizer, CapabilityPredicate, ResponseCache, Validator};
pub use trace::{LogSink, MemorySink, NoopSink, TraceSink};

pub use async_trait::async_trait;
pub use conduit_shared::{ConduitError, ConduitResult};

// ============================================================================
// THREAD SAFETY
// ============================================================================

const _: () = {
    const fn assert_send_sync<T: Send + Sync>() {}
    let _ = assert_send_sync::<Assembly>;
    let _ = assert_send_sync::<Journey>;
    let _ = assert_send_sync::<MemorySink>;
    let _ = assert_send_sync::<RequestFactories>;
};
