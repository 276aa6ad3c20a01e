//! Terminal contract.

use crate::capsule::{Capsule, TraceRecord};
use crate::fault::StageResult;
use crate::shape::Shape;
use async_trait::async_trait;

/// The innermost, domain-specific handler of a conduit.
///
/// `produce` must leave a response on the capsule via
/// [`Capsule::set_response`]; returning `Ok` without one is reported as a
/// terminal fault. A terminal may spawn child capsules (see
/// [`Capsule::spawn`]) and must await all of them before returning.
#[async_trait]
pub trait Terminal<S: Shape>: Send + Sync {
    fn name(&self) -> &str;

    async fn produce(&self, capsule: &mut Capsule<S>, record: &mut TraceRecord) -> StageResult;
}
