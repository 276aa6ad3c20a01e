//! Reference stages for the cross-cutting concerns most assemblies need.
//!
//! Each one is also a [`Layer`](crate::Layer), so it can be registered
//! directly with [`AssemblyBuilder::layer`](crate::AssemblyBuilder::layer).

mod authorizer;
mod cache;
mod validator;

pub use authorizer::{Authorizer, CapabilityPredicate};
pub use cache::ResponseCache;
pub use validator::Validator;
