//! Assemblies: long-lived registries of layers that hand out conduits.
//!
//! An [`Assembly`] is built once from an ordered list of layers, exactly one
//! of which provides terminals. At build time every terminal shape is
//! resolved into a flat [`Route`]; afterwards the assembly is immutable and
//! cheap to clone, and many assemblies can coexist in one process.

mod builder;
mod route;

pub use builder::AssemblyBuilder;
pub(crate) use route::Route;

use crate::capsule::{Capsule, Journey};
use crate::fault::{ConduitFault, Phase, StageFault, error_chain};
use crate::layer::Binding;
use crate::metrics::{AssemblyMetrics, AssemblyMetricsStorage};
use crate::options::AssemblyOptions;
use crate::pipeline::{Conduit, reject};
use crate::shape::{Identity, Shape};
use crate::trace::TraceSink;
use conduit_shared::{ConduitError, ConduitResult};
use std::any::TypeId;
use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::Ordering;

/// A named, immutable registry of layers.
///
/// **Cloning**: cheap via `Arc`; all clones share routes, sink and metrics.
#[derive(Clone)]
pub struct Assembly {
    inner: Arc<AssemblyInner>,
}

/// Shared state behind every clone of an assembly and every conduit it built.
pub(crate) struct AssemblyInner {
    pub(crate) options: AssemblyOptions,
    pub(crate) layers: Vec<String>,
    pub(crate) terminal: String,
    /// `TypeId::of::<S>()` → `Arc<Route<S>>`.
    pub(crate) routes: HashMap<TypeId, Binding>,
    pub(crate) shapes: Vec<String>,
    pub(crate) sink: Arc<dyn TraceSink>,
    pub(crate) metrics: AssemblyMetricsStorage,
}

impl AssemblyInner {
    /// Hand a finished root journey to the sink, isolating the caller from it.
    pub(crate) fn export(&self, journey: &Arc<Journey>) {
        if !self.options.export_traces {
            return;
        }

        let sink = Arc::clone(&self.sink);
        let exported = Arc::clone(journey);
        match panic::catch_unwind(AssertUnwindSafe(move || sink.export(exported))) {
            Ok(()) => {
                self.metrics.exports.fetch_add(1, Ordering::Relaxed);
            }
            Err(_) => {
                self.metrics.sink_failures.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    assembly = %self.options.name,
                    capsule = %journey.id(),
                    "Trace sink panicked while exporting a journey"
                );
            }
        }
    }
}

impl Assembly {
    pub fn builder(name: impl Into<String>) -> AssemblyBuilder {
        AssemblyBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.inner.options.name
    }

    pub fn options(&self) -> &AssemblyOptions {
        &self.inner.options
    }

    /// Layer names in registration order, outermost first.
    pub fn layer_names(&self) -> &[String] {
        &self.inner.layers
    }

    /// Name of the layer that provides the terminals.
    pub fn terminal_layer(&self) -> &str {
        &self.inner.terminal
    }

    /// Labels of every shape this assembly can serve.
    pub fn shapes(&self) -> &[String] {
        &self.inner.shapes
    }

    pub fn supports<S: Shape>(&self) -> bool {
        self.inner.routes.contains_key(&TypeId::of::<S>())
    }

    /// Build a conduit for shape `S`.
    ///
    /// # Errors
    ///
    /// Returns [`ConduitError::Config`] if the terminal layer does not serve `S`.
    pub fn conduit<S: Shape>(&self) -> ConduitResult<Conduit<S>> {
        let route = self.route::<S>()?;
        Ok(Conduit::new(route, Arc::clone(&self.inner)))
    }

    /// Send `capsule` through the conduit for its shape.
    ///
    /// Unlike [`Assembly::conduit`], an unsupported shape is reported as a
    /// journey fault in the `Resolve` phase, and the capsule is aborted.
    pub async fn send<S: Shape>(&self, capsule: &mut Capsule<S>) -> Result<(), ConduitFault> {
        match self.route::<S>() {
            Ok(route) => {
                Conduit::new(route, Arc::clone(&self.inner))
                    .send(capsule)
                    .await
            }
            Err(err) => reject(&self.inner, capsule, err),
        }
    }

    /// Build a root capsule for `identity`, send it and return its response.
    pub async fn dispatch<S: Shape>(
        &self,
        identity: Identity,
        request: S::Request,
    ) -> Result<S::Response, ConduitFault> {
        let mut capsule = Capsule::<S>::for_identity(identity, request);
        self.send(&mut capsule).await?;

        let id = capsule.id();
        capsule.into_response().ok_or_else(|| {
            ConduitFault::new(
                id,
                Phase::Produce,
                format!("{} conduit", S::label()),
                StageFault::Engine(ConduitError::Internal(
                    "journey completed without a response".to_string(),
                )),
                Vec::new(),
            )
        })
    }

    /// Forward a fault that happened outside any journey to the trace sink.
    pub fn report_fault(&self, err: &(dyn Error + 'static)) {
        let message = error_chain(err);
        self.inner
            .metrics
            .out_of_journey_faults
            .fetch_add(1, Ordering::Relaxed);
        tracing::debug!(assembly = %self.name(), fault = %message, "Reporting fault outside journey");

        let sink = Arc::clone(&self.inner.sink);
        if panic::catch_unwind(AssertUnwindSafe(|| sink.export_fault(&message))).is_err() {
            self.inner
                .metrics
                .sink_failures
                .fetch_add(1, Ordering::Relaxed);
            tracing::warn!(assembly = %self.name(), "Trace sink panicked while exporting a fault");
        }
    }

    pub fn metrics(&self) -> AssemblyMetrics {
        self.inner.metrics.snapshot()
    }

    fn route<S: Shape>(&self) -> ConduitResult<Arc<Route<S>>> {
        self.inner
            .routes
            .get(&TypeId::of::<S>())
            .and_then(|binding| binding.downcast_ref::<Arc<Route<S>>>())
            .cloned()
            .ok_or_else(|| {
                ConduitError::Config(format!(
                    "assembly `{}` has no terminal for {} (terminal layer `{}`)",
                    self.name(),
                    S::label(),
                    self.inner.terminal
                ))
            })
    }
}

impl fmt::Debug for Assembly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Assembly")
            .field("name", &self.inner.options.name)
            .field("layers", &self.inner.layers)
            .field("terminal", &self.inner.terminal)
            .field("shapes", &self.inner.shapes)
            .finish()
    }
}
