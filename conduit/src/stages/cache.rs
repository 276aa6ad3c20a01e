use crate::capsule::{Capsule, TraceRecord};
use crate::fault::StageResult;
use crate::layer::{Capabilities, Layer, Stage};
use crate::options::CacheOptions;
use crate::shape::Shape;
use async_trait::async_trait;
use conduit_shared::ConduitResult;
use moka::future::Cache;
use std::hash::Hash;
use std::sync::Arc;

/// Serves repeated requests of shape `S` from memory.
///
/// A hit sets the response on descend, which short-circuits the journey:
/// stages beneath the cache and the terminal do not run. A miss stores the
/// response on ascend, keyed by the request as it looks at that point.
pub struct ResponseCache<S: Shape> {
    name: String,
    cache: Cache<S::Request, S::Response>,
}

impl<S> ResponseCache<S>
where
    S: Shape,
    S::Request: Hash + Eq + Clone,
    S::Response: Clone,
{
    pub fn new(name: impl Into<String>, options: &CacheOptions) -> ConduitResult<Self> {
        options.sanitize()?;

        let mut builder = Cache::builder().max_capacity(options.max_capacity);
        if let Some(ttl) = options.time_to_live() {
            builder = builder.time_to_live(ttl);
        }

        Ok(Self {
            name: name.into(),
            cache: builder.build(),
        })
    }

    pub async fn invalidate(&self, request: &S::Request) {
        self.cache.invalidate(request).await;
    }

    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }
}

#[async_trait]
impl<S> Stage<S> for ResponseCache<S>
where
    S: Shape,
    S::Request: Hash + Eq + Clone,
    S::Response: Clone,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn descend(&self, capsule: &mut Capsule<S>, record: &mut TraceRecord) -> StageResult {
        match self.cache.get(capsule.request()).await {
            Some(hit) => {
                capsule.set_response(hit)?;
                record.log("cache hit");
            }
            None => record.log("cache miss"),
        }
        Ok(())
    }

    async fn ascend(&self, capsule: &mut Capsule<S>, record: &mut TraceRecord) -> StageResult {
        if let Some(response) = capsule.response() {
            self.cache
                .insert(capsule.request().clone(), response.clone())
                .await;
            record.log("stored");
        }
        Ok(())
    }
}

impl<S> Layer for ResponseCache<S>
where
    S: Shape,
    S::Request: Hash + Eq + Clone,
    S::Response: Clone,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(self: Arc<Self>, caps: &mut Capabilities) {
        caps.stage::<S>(self);
    }
}
