//! Pipeline participants.
//!
//! - [`Stage`]: cross-cutting participant with a descend and an ascend phase,
//!   written against one capsule shape.
//! - [`GenericStage`]: a stage written once against the [`Envelope`] view,
//!   serving every shape with a single instance.
//! - [`Terminal`]: the innermost handler that produces the response.
//! - [`Layer`]: a registrable unit declaring which of the above it provides,
//!   and for which shapes, through its [`Capabilities`].
//!
//! [`Envelope`]: crate::Envelope

mod capabilities;
mod stage;
mod terminal;

pub use capabilities::{Capabilities, Layer};
pub use stage::{GenericStage, Stage};
pub use terminal::Terminal;

pub(crate) use capabilities::Binding;
