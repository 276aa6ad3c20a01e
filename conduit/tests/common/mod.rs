//! Shared shapes, stages and terminals for integration tests.

#![allow(dead_code)]

use conduit::{
    Capabilities, Capsule, Envelope, GenericStage, Layer, Shape, Stage, StageFault, StageResult,
    Terminal, TraceRecord, async_trait,
};
use parking_lot::Mutex;
use std::sync::Arc;

conduit::shape!(pub GetPrice => Get "price", String => u64);
conduit::shape!(pub GetGreeting => Get "greeting", String => String);
conduit::shape!(pub PatchStock => Patch "stock", u32 => u32);
conduit::shape!(pub PostOrder => Post "order", Vec<u32> => u32);
conduit::shape!(pub DeleteCustomer => Delete "customer", u64 => bool);

/// Ordered log of phase visits, shared by every participant of a test.
pub type Events = Arc<Mutex<Vec<String>>>;

pub fn events() -> Events {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn stage_names(records: &[TraceRecord]) -> Vec<String> {
    records.iter().map(|r| r.stage().to_string()).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailAt {
    Nowhere,
    Descend,
    Ascend,
}

/// Generic stage that logs each phase and optionally fails one of them.
pub struct Recording {
    name: &'static str,
    events: Events,
    fail: FailAt,
}

impl Recording {
    pub fn new(name: &'static str, events: &Events) -> Self {
        Self::failing(name, events, FailAt::Nowhere)
    }

    pub fn failing(name: &'static str, events: &Events, fail: FailAt) -> Self {
        Self {
            name,
            events: Arc::clone(events),
            fail,
        }
    }
}

#[async_trait]
impl GenericStage for Recording {
    fn name(&self) -> &str {
        self.name
    }

    async fn descend(&self, _capsule: &dyn Envelope, record: &mut TraceRecord) -> StageResult {
        self.events.lock().push(format!("{}:descend", self.name));
        record.log("descend");
        if self.fail == FailAt::Descend {
            return Err(StageFault::validation(format!("{} rejected the request", self.name)));
        }
        Ok(())
    }

    async fn ascend(&self, capsule: &dyn Envelope, record: &mut TraceRecord) -> StageResult {
        assert!(capsule.has_response());
        self.events.lock().push(format!("{}:ascend", self.name));
        record.log("ascend");
        if self.fail == FailAt::Ascend {
            return Err(StageFault::post_processing(format!(
                "{} rejected the response",
                self.name
            )));
        }
        Ok(())
    }
}

impl Layer for Recording {
    fn name(&self) -> &str {
        self.name
    }

    fn capabilities(self: Arc<Self>, caps: &mut Capabilities) {
        caps.every_shape(self);
    }
}

/// Terminal that answers every request with the same value, or fails.
pub struct Fixed<S: Shape> {
    name: &'static str,
    value: Option<S::Response>,
    events: Events,
}

impl<S: Shape> Fixed<S> {
    pub fn new(name: &'static str, value: S::Response, events: &Events) -> Self {
        Self {
            name,
            value: Some(value),
            events: Arc::clone(events),
        }
    }

    pub fn failing(name: &'static str, events: &Events) -> Self {
        Self {
            name,
            value: None,
            events: Arc::clone(events),
        }
    }
}

#[async_trait]
impl<S> Terminal<S> for Fixed<S>
where
    S: Shape,
    S::Response: Clone,
{
    fn name(&self) -> &str {
        self.name
    }

    async fn produce(&self, capsule: &mut Capsule<S>, record: &mut TraceRecord) -> StageResult {
        self.events.lock().push(format!("{}:produce", self.name));
        match &self.value {
            Some(value) => {
                capsule.set_response(value.clone())?;
                record.log("produced");
                Ok(())
            }
            None => Err(StageFault::terminal("connection refused")),
        }
    }
}

impl<S> Layer for Fixed<S>
where
    S: Shape,
    S::Response: Clone,
{
    fn name(&self) -> &str {
        self.name
    }

    fn capabilities(self: Arc<Self>, caps: &mut Capabilities) {
        caps.terminal::<S>(self);
    }
}

/// `GetGreeting` stage that translates the response on ascend.
pub struct Translate;

#[async_trait]
impl Stage<GetGreeting> for Translate {
    fn name(&self) -> &str {
        "translate"
    }

    async fn ascend(
        &self,
        capsule: &mut Capsule<GetGreeting>,
        record: &mut TraceRecord,
    ) -> StageResult {
        if let Some(greeting) = capsule.response_mut()
            && *greeting == "hello"
        {
            *greeting = "bonjour".to_string();
            record.log("translated to french");
        }
        Ok(())
    }
}

impl Layer for Translate {
    fn name(&self) -> &str {
        "translate"
    }

    fn capabilities(self: Arc<Self>, caps: &mut Capabilities) {
        caps.stage::<GetGreeting>(self);
    }
}

/// `PatchStock` terminal that doubles the requested quantity.
pub struct Doubler;

#[async_trait]
impl Terminal<PatchStock> for Doubler {
    fn name(&self) -> &str {
        "doubler"
    }

    async fn produce(
        &self,
        capsule: &mut Capsule<PatchStock>,
        _record: &mut TraceRecord,
    ) -> StageResult {
        let doubled = capsule.request() * 2;
        capsule.set_response(doubled)?;
        Ok(())
    }
}

impl Layer for Doubler {
    fn name(&self) -> &str {
        "doubler"
    }

    fn capabilities(self: Arc<Self>, caps: &mut Capabilities) {
        caps.terminal::<PatchStock>(self);
    }
}
