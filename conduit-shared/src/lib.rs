//! Types shared between the conduit engine and the crates embedding it.

pub mod errors;

pub use errors::{ConduitError, ConduitResult};
