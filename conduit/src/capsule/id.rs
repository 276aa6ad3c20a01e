//! Capsule and trace-record identifiers.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;
use ulid::{Generator, Ulid};

/// Monotonic within a process run, so ids stay unique and sortable even
/// when many capsules are created in the same millisecond.
static GENERATOR: LazyLock<Mutex<Generator>> = LazyLock::new(|| Mutex::new(Generator::new()));

/// Opaque correlation id assigned to a capsule at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CapsuleId(Ulid);

impl CapsuleId {
    pub fn new() -> Self {
        let id = GENERATOR.lock().generate().unwrap_or_else(|_| Ulid::new());
        Self(id)
    }

    /// Short form for log lines (random tail of the ULID).
    pub fn short(&self) -> String {
        let full = self.0.to_string();
        full[full.len() - 8..].to_string()
    }
}

impl Default for CapsuleId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CapsuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Points at one trace record of one capsule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordRef {
    pub capsule: CapsuleId,
    pub index: usize,
}

impl fmt::Display for RecordRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.capsule.short(), self.index)
    }
}
