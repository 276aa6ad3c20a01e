use crate::capsule::{Capsule, TraceRecord};
use crate::fault::{StageFault, StageResult};
use crate::layer::{Capabilities, Layer, Stage};
use crate::shape::Shape;
use async_trait::async_trait;
use std::sync::Arc;

type Check<R> = Box<dyn Fn(&R) -> Result<(), String> + Send + Sync>;

/// Rejects requests of shape `S` that fail a precondition.
pub struct Validator<S: Shape> {
    name: String,
    check: Check<S::Request>,
}

impl<S: Shape> Validator<S> {
    pub fn new<F>(name: impl Into<String>, check: F) -> Self
    where
        F: Fn(&S::Request) -> Result<(), String> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            check: Box::new(check),
        }
    }
}

#[async_trait]
impl<S: Shape> Stage<S> for Validator<S> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn descend(&self, capsule: &mut Capsule<S>, _record: &mut TraceRecord) -> StageResult {
        (self.check)(capsule.request()).map_err(StageFault::validation)
    }
}

impl<S: Shape> Layer for Validator<S> {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(self: Arc<Self>, caps: &mut Capabilities) {
        caps.stage::<S>(self);
    }
}
