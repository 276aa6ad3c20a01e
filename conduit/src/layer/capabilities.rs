//! Capability sets: how a layer declares the shapes it serves.
//!
//! Resolution happens once, when the assembly is built. Each terminal shape
//! turns into a flat, ordered stage list; nothing is inspected per call.

use super::stage::{GenericStage, Stage, Universal};
use super::terminal::Terminal;
use crate::assembly::Route;
use crate::shape::Shape;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

/// A type-erased, shape-specific value (`Arc<dyn Stage<S>>`, `Arc<Route<S>>`).
pub(crate) type Binding = Box<dyn Any + Send + Sync>;

type Resolver = Box<dyn FnOnce(&[Capabilities]) -> Binding + Send + Sync>;

pub(crate) struct TerminalBinding {
    pub(crate) shape: TypeId,
    pub(crate) label: String,
    pub(crate) resolve: Resolver,
}

/// A registrable pipeline participant.
///
/// # Example
///
/// ```ignore
/// impl Layer for PriceStore {
///     fn name(&self) -> &str {
///         "price-store"
///     }
///
///     fn capabilities(self: Arc<Self>, caps: &mut Capabilities) {
///         caps.terminal::<GetPrice>(self.clone())
///             .terminal::<ListPrices>(self);
///     }
/// }
/// ```
pub trait Layer: Send + Sync + 'static {
    fn name(&self) -> &str;

    /// Declare every stage and terminal binding this layer provides.
    fn capabilities(self: Arc<Self>, caps: &mut Capabilities);
}

/// The capability set one layer declares.
#[derive(Default)]
pub struct Capabilities {
    stages: HashMap<TypeId, Binding>,
    every_shape: Option<Arc<dyn GenericStage>>,
    pub(crate) terminals: Vec<TerminalBinding>,
}

impl Capabilities {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Serve capsules of shape `S` with a shape-specific stage.
    pub fn stage<S: Shape>(&mut self, stage: Arc<dyn Stage<S>>) -> &mut Self {
        self.stages.insert(TypeId::of::<S>(), Box::new(stage));
        self
    }

    /// Serve every shape with one generic stage.
    ///
    /// A shape-specific binding from [`Capabilities::stage`] takes precedence.
    pub fn every_shape(&mut self, stage: Arc<dyn GenericStage>) -> &mut Self {
        self.every_shape = Some(stage);
        self
    }

    /// Produce responses for shape `S`.
    pub fn terminal<S: Shape>(&mut self, terminal: Arc<dyn Terminal<S>>) -> &mut Self {
        self.terminals.push(TerminalBinding {
            shape: TypeId::of::<S>(),
            label: S::label(),
            resolve: Box::new(move |layers: &[Capabilities]| {
                let stages: Vec<Arc<dyn Stage<S>>> =
                    layers.iter().filter_map(|caps| caps.stage_for::<S>()).collect();
                Box::new(Arc::new(Route::new(terminal, stages))) as Binding
            }),
        });
        self
    }

    pub fn is_terminal(&self) -> bool {
        !self.terminals.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty() && self.every_shape.is_none() && self.terminals.is_empty()
    }

    pub(crate) fn stage_for<S: Shape>(&self) -> Option<Arc<dyn Stage<S>>> {
        self.stages
            .get(&TypeId::of::<S>())
            .and_then(|binding| binding.downcast_ref::<Arc<dyn Stage<S>>>())
            .cloned()
            .or_else(|| {
                self.every_shape
                    .clone()
                    .map(|stage| Arc::new(Universal::<S>::new(stage)) as Arc<dyn Stage<S>>)
            })
    }
}
