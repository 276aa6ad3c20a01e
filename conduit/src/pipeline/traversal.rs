//! The conduit: one compiled, ordered pipeline for one capsule shape.

use super::metrics::JourneyMetrics;
use crate::assembly::{AssemblyInner, Route};
use crate::capsule::{Capsule, Direction, JourneyStatus, RecordKind, TraceRecord};
use crate::fault::{ConduitFault, Phase, StageFault, StageResult, error_chain};
use crate::shape::Shape;
use conduit_shared::ConduitError;
use std::fmt;
use std::sync::Arc;
use tracing::Instrument;

/// What a successful traversal looked like.
pub(crate) struct Traversal {
    /// Stage whose descend produced the response, if the terminal was skipped.
    short_circuited: Option<String>,
}

/// A ready-to-send pipeline for capsules of shape `S`.
///
/// Conduits hold no traversal state: all of it lives on the capsule, so one
/// conduit (or any number of clones) can carry concurrent journeys.
pub struct Conduit<S: Shape> {
    route: Arc<Route<S>>,
    assembly: Arc<AssemblyInner>,
}

impl<S: Shape> Clone for Conduit<S> {
    fn clone(&self) -> Self {
        Self {
            route: Arc::clone(&self.route),
            assembly: Arc::clone(&self.assembly),
        }
    }
}

impl<S: Shape> fmt::Debug for Conduit<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Conduit")
            .field("shape", &S::label())
            .field("assembly", &self.assembly.options.name)
            .field("stages", &self.stage_names())
            .field("terminal", &self.terminal_name())
            .finish()
    }
}

impl<S: Shape> Conduit<S> {
    pub(crate) fn new(route: Arc<Route<S>>, assembly: Arc<AssemblyInner>) -> Self {
        Self { route, assembly }
    }

    pub fn label(&self) -> String {
        S::label()
    }

    /// Stage names, outermost first.
    pub fn stage_names(&self) -> Vec<&str> {
        self.route.stage_names()
    }

    pub fn terminal_name(&self) -> &str {
        self.route.terminal_name()
    }

    /// Drive `capsule` down through every stage to the terminal and back up.
    ///
    /// On return the capsule is in a terminal state: `Complete` with a
    /// response, or `Aborted` with a fault. Root capsules are handed to the
    /// assembly's trace sink either way.
    ///
    /// # Errors
    ///
    /// Returns a [`ConduitFault`] if:
    /// - The capsule was already sent, or is nested deeper than allowed
    /// - The capsule is a child whose parent is no longer in flight
    /// - Any descend, terminal or ascend phase raises
    pub async fn send(&self, capsule: &mut Capsule<S>) -> Result<(), ConduitFault> {
        admit(&self.assembly, capsule)?;

        let span = tracing::debug_span!(
            "journey",
            capsule = %capsule.id().short(),
            shape = %S::label(),
            assembly = %self.assembly.options.name,
        );
        let outcome = self.traverse(capsule).instrument(span).await;

        settle(&self.assembly, capsule, outcome)
    }

    async fn traverse(&self, capsule: &mut Capsule<S>) -> Result<Traversal, ConduitFault> {
        let stages = &self.route.stages;
        let mut short_circuit = None;

        for (index, stage) in stages.iter().enumerate() {
            let mut record =
                capsule
                    .journey()
                    .open_record(stage.name(), Direction::Descending, RecordKind::Stage);
            let result = stage.descend(capsule, &mut record).await;
            conclude(capsule, record, Phase::Descend, result)?;

            if capsule.has_response() {
                tracing::debug!(stage = stage.name(), "Stage produced the response on descend");
                short_circuit = Some(index);
                break;
            }
        }

        if short_circuit.is_none() {
            let terminal = &self.route.terminal;
            let mut record = capsule.journey().open_record(
                terminal.name(),
                Direction::Descending,
                RecordKind::Terminal,
            );
            let result = match terminal.produce(capsule, &mut record).await {
                Ok(()) if !capsule.has_response() => Err(StageFault::terminal(format!(
                    "`{}` returned without a response",
                    terminal.name()
                ))),
                other => other,
            };
            conclude(capsule, record, Phase::Produce, result)?;
        }

        // The short-circuiting stage already handled the response; only the
        // stages above it ascend.
        let ascending = short_circuit.unwrap_or(stages.len());
        for stage in stages[..ascending].iter().rev() {
            let mut record =
                capsule
                    .journey()
                    .open_record(stage.name(), Direction::Ascending, RecordKind::Stage);
            let result = stage.ascend(capsule, &mut record).await;
            conclude(capsule, record, Phase::Ascend, result)?;
        }

        Ok(Traversal {
            short_circuited: short_circuit.map(|index| stages[index].name().to_string()),
        })
    }
}

/// Close the phase record, turning a raised fault into a `ConduitFault`.
fn conclude<S: Shape>(
    capsule: &Capsule<S>,
    mut record: TraceRecord,
    phase: Phase,
    result: StageResult,
) -> Result<(), ConduitFault> {
    match result {
        Ok(()) => {
            record.close();
            capsule.journey().close_record(&record);
            tracing::trace!(
                stage = record.stage(),
                direction = %record.direction(),
                duration_ms = ?record.duration_ms(),
                "Phase complete"
            );
            Ok(())
        }
        Err(cause) => {
            record.fail(error_chain(&cause));
            capsule.journey().close_record(&record);
            tracing::debug!(
                stage = record.stage(),
                phase = %phase,
                error = %error_chain(&cause),
                "Phase raised a fault"
            );
            Err(ConduitFault::new(
                capsule.id(),
                phase,
                record.description(),
                cause,
                capsule.records(),
            ))
        }
    }
}

/// Move an idle capsule into flight, or explain why it cannot go.
fn admit<S: Shape>(assembly: &AssemblyInner, capsule: &Capsule<S>) -> Result<(), ConduitFault> {
    let refuse = |err: ConduitError| {
        ConduitFault::new(
            capsule.id(),
            Phase::Admission,
            format!("{} conduit", S::label()),
            StageFault::Engine(err),
            capsule.records(),
        )
    };

    if capsule.has_response() || capsule.journey().has_fault() {
        return Err(refuse(ConduitError::InvalidState(format!(
            "capsule {} already holds a result",
            capsule.id()
        ))));
    }

    // A child may only travel while its parent is still on the call stack.
    if let Some(parent_id) = capsule.parent_id() {
        let parent_status = capsule.parent().map(|parent| parent.status());
        if parent_status != Some(JourneyStatus::InFlight) {
            return Err(refuse(ConduitError::InvalidState(format!(
                "capsule {} outlived its parent {} ({})",
                capsule.id(),
                parent_id,
                parent_status.map_or_else(|| "dropped".to_string(), |s| format!("{:?}", s))
            ))));
        }
    }

    let max_depth = assembly.options.max_depth;
    let depth = capsule.journey().depth();
    if max_depth > 0 && depth > max_depth {
        return Err(refuse(ConduitError::InvalidState(format!(
            "capsule {} is nested {} deep, limit is {}",
            capsule.id(),
            depth,
            max_depth
        ))));
    }

    capsule.journey().begin().map_err(refuse)?;
    assembly.metrics.record_started();
    Ok(())
}

/// Put the capsule into its terminal state and export it if it is a root.
fn settle<S: Shape>(
    assembly: &AssemblyInner,
    capsule: &mut Capsule<S>,
    outcome: Result<Traversal, ConduitFault>,
) -> Result<(), ConduitFault> {
    let journey = Arc::clone(capsule.journey());

    let result = match outcome {
        Ok(traversal) => {
            if let Err(e) = journey.finish(JourneyStatus::Complete) {
                tracing::warn!(capsule = %journey.id().short(), "Failed to complete journey: {}", e);
            }
            assembly
                .metrics
                .record_completed(traversal.short_circuited.is_some());
            tracing::debug!(
                capsule = %journey.id().short(),
                shape = %S::label(),
                records = journey.record_count(),
                short_circuit = ?traversal.short_circuited,
                duration_ms = ?journey.duration().map(|d| d.as_millis()),
                "Journey complete"
            );
            Ok(())
        }
        Err(fault) => {
            capsule.discard_response();
            if let Err(e) = capsule.set_fault(fault.summary()) {
                tracing::warn!(capsule = %journey.id().short(), "Failed to record fault: {}", e);
            }
            if let Err(e) = journey.finish(JourneyStatus::Aborted) {
                tracing::warn!(capsule = %journey.id().short(), "Failed to abort journey: {}", e);
            }
            assembly.metrics.record_aborted();
            if journey.is_root() {
                tracing::warn!(
                    capsule = %journey.id().short(),
                    shape = %S::label(),
                    phase = %fault.phase(),
                    location = fault.location(),
                    error = %error_chain(fault.cause()),
                    "Journey aborted"
                );
            } else {
                tracing::debug!(
                    capsule = %journey.id().short(),
                    shape = %S::label(),
                    phase = %fault.phase(),
                    "Nested journey aborted"
                );
            }
            Err(fault)
        }
    };

    if journey.is_root() {
        assembly.export(&journey);
        if assembly.options.log_journeys {
            log_metrics(&journey.metrics());
        }
    }

    result
}

fn log_metrics(metrics: &JourneyMetrics) {
    for phase in &metrics.phases {
        tracing::debug!(
            stage = %phase.stage,
            direction = %phase.direction,
            duration_ms = ?phase.duration_ms,
            "Journey phase"
        );
    }
}

/// Abort a capsule whose shape the assembly cannot serve.
pub(crate) fn reject<S: Shape>(
    assembly: &AssemblyInner,
    capsule: &mut Capsule<S>,
    err: ConduitError,
) -> Result<(), ConduitFault> {
    admit(assembly, capsule)?;

    let fault = ConduitFault::new(
        capsule.id(),
        Phase::Resolve,
        format!("assembly {}", assembly.options.name),
        StageFault::Engine(err),
        Vec::new(),
    );
    settle(assembly, capsule, Err(fault))
}
