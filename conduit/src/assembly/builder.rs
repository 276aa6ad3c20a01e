use super::{Assembly, AssemblyInner};
use crate::layer::{Capabilities, Layer};
use crate::metrics::AssemblyMetricsStorage;
use crate::options::AssemblyOptions;
use crate::trace::{LogSink, NoopSink, TraceSink};
use conduit_shared::{ConduitError, ConduitResult};
use std::collections::{HashMap, HashSet};
use std::mem;
use std::sync::Arc;

/// Collects layers in registration order and resolves them into an [`Assembly`].
///
/// The first layer registered is the outermost: it descends first and
/// ascends last.
///
/// # Example
///
/// ```ignore
/// let assembly = Assembly::builder("pricing")
///     .layer(Authorizer::new("authz", policy))
///     .layer(PriceStore::new(pool))
///     .sink(Arc::new(LogSink))
///     .build()?;
/// ```
pub struct AssemblyBuilder {
    options: AssemblyOptions,
    layers: Vec<Arc<dyn Layer>>,
    sink: Option<Arc<dyn TraceSink>>,
}

impl AssemblyBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            options: AssemblyOptions::named(name),
            layers: Vec::new(),
            sink: None,
        }
    }

    /// Replace all options, including the name.
    pub fn options(mut self, options: AssemblyOptions) -> Self {
        self.options = options;
        self
    }

    pub fn layer<L: Layer>(self, layer: L) -> Self {
        self.shared_layer(Arc::new(layer))
    }

    /// Register a layer instance that is also used elsewhere.
    pub fn shared_layer(mut self, layer: Arc<dyn Layer>) -> Self {
        self.layers.push(layer);
        self
    }

    /// Defaults to [`LogSink`] when `log_journeys` is set, otherwise [`NoopSink`].
    pub fn sink(mut self, sink: Arc<dyn TraceSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Resolve every terminal shape into its ordered route.
    ///
    /// # Errors
    ///
    /// Returns [`ConduitError::Config`] if:
    /// - The options fail validation
    /// - Two layers share a name
    /// - No layer, or more than one layer, declares terminals
    /// - The terminal layer declares two terminals for one shape
    pub fn build(self) -> ConduitResult<Assembly> {
        let AssemblyBuilder {
            options,
            layers,
            sink,
        } = self;

        options.sanitize()?;

        let mut seen = HashSet::new();
        let mut names = Vec::with_capacity(layers.len());
        let mut capabilities = Vec::with_capacity(layers.len());
        for layer in layers {
            let name = layer.name().to_string();
            if !seen.insert(name.clone()) {
                return Err(ConduitError::Config(format!(
                    "assembly `{}` registers layer `{}` twice",
                    options.name, name
                )));
            }

            let mut caps = Capabilities::new();
            layer.capabilities(&mut caps);
            if caps.is_empty() {
                tracing::warn!(assembly = %options.name, layer = %name, "Layer declares no capabilities");
            }
            names.push(name);
            capabilities.push(caps);
        }

        let terminal_layers: Vec<usize> = capabilities
            .iter()
            .enumerate()
            .filter(|(_, caps)| caps.is_terminal())
            .map(|(index, _)| index)
            .collect();
        let terminal_index = match terminal_layers.as_slice() {
            [index] => *index,
            [] => {
                return Err(ConduitError::Config(format!(
                    "assembly `{}` has no terminal layer",
                    options.name
                )));
            }
            many => {
                let offenders: Vec<&str> = many.iter().map(|&i| names[i].as_str()).collect();
                return Err(ConduitError::Config(format!(
                    "assembly `{}` has {} terminal layers ({}), expected exactly one",
                    options.name,
                    many.len(),
                    offenders.join(", ")
                )));
            }
        };

        let terminals = mem::take(&mut capabilities[terminal_index].terminals);
        let mut routes = HashMap::with_capacity(terminals.len());
        let mut shapes = Vec::with_capacity(terminals.len());
        for binding in terminals {
            if routes.contains_key(&binding.shape) {
                return Err(ConduitError::Config(format!(
                    "terminal layer `{}` declares {} twice",
                    names[terminal_index], binding.label
                )));
            }
            let route = (binding.resolve)(&capabilities);
            tracing::trace!(assembly = %options.name, shape = %binding.label, "Resolved conduit route");
            routes.insert(binding.shape, route);
            shapes.push(binding.label);
        }

        let sink = sink.unwrap_or_else(|| {
            if options.log_journeys {
                Arc::new(LogSink)
            } else {
                Arc::new(NoopSink)
            }
        });

        tracing::debug!(
            assembly = %options.name,
            layers = names.len(),
            shapes = shapes.len(),
            terminal = %names[terminal_index],
            "Assembly built"
        );

        let terminal = names[terminal_index].clone();
        Ok(Assembly {
            inner: Arc::new(AssemblyInner {
                options,
                layers: names,
                terminal,
                routes,
                shapes,
                sink,
                metrics: AssemblyMetricsStorage::new(),
            }),
        })
    }
}
