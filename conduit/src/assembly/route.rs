use crate::layer::{Stage, Terminal};
use crate::shape::Shape;
use std::sync::Arc;

/// The resolved pipeline for one shape: stages outermost first, then the
/// terminal.
pub(crate) struct Route<S: Shape> {
    pub(crate) terminal: Arc<dyn Terminal<S>>,
    pub(crate) stages: Vec<Arc<dyn Stage<S>>>,
}

impl<S: Shape> Route<S> {
    pub(crate) fn new(terminal: Arc<dyn Terminal<S>>, stages: Vec<Arc<dyn Stage<S>>>) -> Self {
        Self { terminal, stages }
    }

    pub(crate) fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|stage| stage.name()).collect()
    }

    pub(crate) fn terminal_name(&self) -> &str {
        self.terminal.name()
    }
}
