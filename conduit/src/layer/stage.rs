//! Stage contracts.

use crate::capsule::{Capsule, Envelope, TraceRecord};
use crate::fault::StageResult;
use crate::shape::Shape;
use async_trait::async_trait;
use std::marker::PhantomData;
use std::sync::Arc;

/// A cross-cutting participant for capsules of shape `S`.
///
/// Stages are stateless capability objects: one instance serves any number
/// of concurrent journeys, so per-call state lives on the capsule or the
/// record, never on `self`. Both phases default to pass-through.
#[async_trait]
pub trait Stage<S: Shape>: Send + Sync {
    /// Name used in trace records and logs.
    fn name(&self) -> &str;

    /// Inspect, validate or rewrite the request on the way down.
    ///
    /// Setting a response here short-circuits the journey: deeper stages and
    /// the terminal are skipped and only the stages above this one ascend.
    async fn descend(&self, capsule: &mut Capsule<S>, record: &mut TraceRecord) -> StageResult {
        let _ = (capsule, record);
        Ok(())
    }

    /// Inspect or rewrite the response on the way up.
    async fn ascend(&self, capsule: &mut Capsule<S>, record: &mut TraceRecord) -> StageResult {
        let _ = (capsule, record);
        Ok(())
    }
}

/// A stage written against the view shared by every capsule shape.
#[async_trait]
pub trait GenericStage: Send + Sync {
    fn name(&self) -> &str;

    async fn descend(&self, capsule: &dyn Envelope, record: &mut TraceRecord) -> StageResult {
        let _ = (capsule, record);
        Ok(())
    }

    async fn ascend(&self, capsule: &dyn Envelope, record: &mut TraceRecord) -> StageResult {
        let _ = (capsule, record);
        Ok(())
    }
}

/// Binds a generic stage to one concrete shape.
pub(crate) struct Universal<S> {
    stage: Arc<dyn GenericStage>,
    _shape: PhantomData<fn() -> S>,
}

impl<S> Universal<S> {
    pub(crate) fn new(stage: Arc<dyn GenericStage>) -> Self {
        Self {
            stage,
            _shape: PhantomData,
        }
    }
}

#[async_trait]
impl<S: Shape> Stage<S> for Universal<S> {
    fn name(&self) -> &str {
        self.stage.name()
    }

    async fn descend(&self, capsule: &mut Capsule<S>, record: &mut TraceRecord) -> StageResult {
        self.stage.descend(&*capsule, record).await
    }

    async fn ascend(&self, capsule: &mut Capsule<S>, record: &mut TraceRecord) -> StageResult {
        self.stage.ascend(&*capsule, record).await
    }
}
