//! Two-phase traversal engine.
//!
//! This module drives one capsule through a compiled conduit:
//! - Descend through every stage, outermost first
//! - Produce the response at the terminal
//! - Ascend through the same stages in exact reverse order
//!
//! ## Architecture
//!
//! ```text
//! Idle → Descending(1..n) → AtTerminal → Ascending(n..1) → Complete
//!            │                  │              │
//!            └──────────────────┴──────────────┴──────────→ Aborted
//! ```
//!
//! Any fault aborts the journey on the spot: nothing deeper runs and no
//! ascend phase runs after a descend or terminal fault. Every phase leaves a
//! trace record on the capsule; the failing one carries the fault.
//!
//! ## Example
//!
//! ```ignore
//! let conduit = assembly.conduit::<GetPrice>()?;
//! let mut capsule = Capsule::<GetPrice>::new(query);
//! conduit.send(&mut capsule).await?;
//! println!("{} records", capsule.records().len());
//! ```

mod metrics;
mod traversal;

pub use metrics::{JourneyMetrics, PhaseMetrics};
pub use traversal::Conduit;

pub(crate) use traversal::reject;
