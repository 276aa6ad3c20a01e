//! Named request factories.
//!
//! Layers that parse untyped input (HTTP bodies, queue messages) cannot name
//! a [`Shape`] at compile time. [`RequestFactories`] maps a name to one typed
//! entry point, registered up front, so a JSON field map can be turned into
//! a typed capsule and sent without any runtime type lookup.

use crate::assembly::Assembly;
use crate::fault::ConduitFault;
use crate::shape::{Identity, Shape};
use conduit_shared::{ConduitError, ConduitResult};
use futures::future::BoxFuture;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FactoryError {
    /// The request could not be built: unknown factory or bad fields.
    #[error("request construction failed")]
    Construct(#[source] ConduitError),

    #[error(transparent)]
    Journey(#[from] ConduitFault),

    /// The journey succeeded but its response could not be serialized.
    #[error("response encoding failed")]
    Encode(#[source] ConduitError),
}

type Invoker = Box<
    dyn Fn(Assembly, Identity, Value) -> BoxFuture<'static, Result<Value, FactoryError>>
        + Send
        + Sync,
>;

struct Factory {
    label: String,
    invoke: Invoker,
}

/// Registry of `name → typed entry point`.
#[derive(Default)]
pub struct RequestFactories {
    factories: BTreeMap<String, Factory>,
}

impl fmt::Debug for RequestFactories {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.factories.iter().map(|(name, factory)| (name, &factory.label)))
            .finish()
    }
}

impl RequestFactories {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register shape `S` under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`ConduitError::Config`] if `name` is already taken.
    pub fn register<S>(&mut self, name: impl Into<String>) -> ConduitResult<&mut Self>
    where
        S: Shape,
        S::Request: DeserializeOwned,
        S::Response: Serialize,
    {
        let name = name.into();
        if let Some(existing) = self.factories.get(&name) {
            return Err(ConduitError::Config(format!(
                "request factory `{}` is already registered for {}",
                name, existing.label
            )));
        }

        self.factories.insert(
            name,
            Factory {
                label: S::label(),
                invoke: Box::new(|assembly: Assembly, identity: Identity, fields: Value| {
                    Box::pin(invoke::<S>(assembly, identity, fields))
                        as BoxFuture<'static, Result<Value, FactoryError>>
                }),
            },
        );
        Ok(self)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Shape label registered under `name`.
    pub fn label(&self, name: &str) -> Option<&str> {
        self.factories.get(name).map(|f| f.label.as_str())
    }

    /// Build the request registered under `name` from `fields`, send it
    /// through `assembly` and return the serialized response.
    ///
    /// Construction failures happen before any journey exists, so they are
    /// reported through [`Assembly::report_fault`].
    pub async fn invoke(
        &self,
        assembly: &Assembly,
        name: &str,
        identity: Identity,
        fields: Value,
    ) -> Result<Value, FactoryError> {
        let Some(factory) = self.factories.get(name) else {
            let err = ConduitError::NotFound(format!("no request factory named `{}`", name));
            assembly.report_fault(&err);
            return Err(FactoryError::Construct(err));
        };

        tracing::debug!(
            factory = name,
            shape = %factory.label,
            identity = %identity,
            "Invoking request factory"
        );
        (factory.invoke)(assembly.clone(), identity, fields).await
    }
}

async fn invoke<S>(
    assembly: Assembly,
    identity: Identity,
    fields: Value,
) -> Result<Value, FactoryError>
where
    S: Shape,
    S::Request: DeserializeOwned,
    S::Response: Serialize,
{
    let request: S::Request = match serde_json::from_value(fields) {
        Ok(request) => request,
        Err(e) => {
            let err = ConduitError::InvalidArgument(format!("fields for {}: {}", S::label(), e));
            assembly.report_fault(&err);
            return Err(FactoryError::Construct(err));
        }
    };

    let response = assembly.dispatch::<S>(identity, request).await?;
    serde_json::to_value(response).map_err(|e| FactoryError::Encode(ConduitError::from(e)))
}
