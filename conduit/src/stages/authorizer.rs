use crate::capsule::{Envelope, TraceRecord};
use crate::fault::{StageFault, StageResult};
use crate::layer::{Capabilities, GenericStage, Layer};
use crate::shape::{EntityKind, Identity, Operation};
use async_trait::async_trait;
use std::sync::Arc;

/// Decides whether a caller may perform an operation on an entity.
pub trait CapabilityPredicate: Send + Sync + 'static {
    fn permits(&self, identity: &Identity, operation: Operation, entity: EntityKind) -> bool;
}

impl<F> CapabilityPredicate for F
where
    F: Fn(&Identity, Operation, EntityKind) -> bool + Send + Sync + 'static,
{
    fn permits(&self, identity: &Identity, operation: Operation, entity: EntityKind) -> bool {
        self(identity, operation, entity)
    }
}

/// Gates every shape of an assembly behind a [`CapabilityPredicate`].
///
/// Denial raises [`StageFault::Authorization`] on descend. Ascend is a
/// pass-through.
pub struct Authorizer {
    name: String,
    predicate: Box<dyn CapabilityPredicate>,
}

impl Authorizer {
    pub fn new(name: impl Into<String>, predicate: impl CapabilityPredicate) -> Self {
        Self {
            name: name.into(),
            predicate: Box::new(predicate),
        }
    }
}

#[async_trait]
impl GenericStage for Authorizer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn descend(&self, capsule: &dyn Envelope, record: &mut TraceRecord) -> StageResult {
        let (identity, operation, entity) =
            (capsule.identity(), capsule.operation(), capsule.entity());

        if !self.predicate.permits(identity, operation, entity) {
            tracing::debug!(
                capsule = %capsule.id().short(),
                identity = %identity,
                operation = %operation,
                entity = %entity,
                "Capability denied"
            );
            return Err(StageFault::denied(identity, operation, entity));
        }

        record.log(format!("{} may {} {}", identity, operation, entity));
        Ok(())
    }
}

impl Layer for Authorizer {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(self: Arc<Self>, caps: &mut Capabilities) {
        caps.every_shape(self);
    }
}
