//! Configuration for assemblies, the reference cache stage and logging.

use conduit_shared::{ConduitError, ConduitResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Assembly-wide settings, fixed at build time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssemblyOptions {
    /// Name used in logs and resolve faults.
    pub name: String,
    /// Hand completed root journeys to the trace sink.
    pub export_traces: bool,
    /// Use the logging sink when no sink is configured explicitly, and log
    /// per-phase timings of root journeys at debug level.
    pub log_journeys: bool,
    /// Deepest capsule nesting a conduit will admit. 0 disables the limit.
    pub max_depth: usize,
}

impl Default for AssemblyOptions {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            export_traces: true,
            log_journeys: false,
            max_depth: 32,
        }
    }
}

impl AssemblyOptions {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Validate options before an assembly is built.
    pub fn sanitize(&self) -> ConduitResult<()> {
        if self.name.trim().is_empty() {
            return Err(ConduitError::Config(
                "assembly name must not be empty".to_string(),
            ));
        }
        if self.name.chars().any(char::is_control) {
            return Err(ConduitError::Config(format!(
                "assembly name {:?} contains control characters",
                self.name
            )));
        }
        Ok(())
    }
}

/// Settings for [`ResponseCache`](crate::stages::ResponseCache).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheOptions {
    pub max_capacity: u64,
    /// Entry lifetime in seconds; `None` keeps entries until evicted by size.
    pub time_to_live_secs: Option<u64>,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            max_capacity: 10_000,
            time_to_live_secs: None,
        }
    }
}

impl CacheOptions {
    pub fn time_to_live(&self) -> Option<Duration> {
        self.time_to_live_secs.map(Duration::from_secs)
    }

    pub fn sanitize(&self) -> ConduitResult<()> {
        if self.max_capacity == 0 {
            return Err(ConduitError::Config(
                "cache max_capacity must be greater than zero".to_string(),
            ));
        }
        if self.time_to_live_secs == Some(0) {
            return Err(ConduitError::Config(
                "cache time_to_live_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Settings for [`init_logging`](crate::logging::init_logging).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingOptions {
    /// `EnvFilter` directives, used when `RUST_LOG` is unset.
    pub filter: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
    /// Write to daily-rotated files in this directory instead of stderr.
    pub directory: Option<PathBuf>,
    pub file_prefix: String,
}

impl Default for LoggingOptions {
    fn default() -> Self {
        Self {
            filter: "conduit=info".to_string(),
            json: false,
            directory: None,
            file_prefix: "conduit.log".to_string(),
        }
    }
}
