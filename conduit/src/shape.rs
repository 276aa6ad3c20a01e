//! Capsule shapes.
//!
//! A shape is the static `(operation, entity)` pair a conduit serves, together
//! with the request type carried down and the response type carried back up.
//! Shapes are zero-sized marker types; the `shape!` macro declares one.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The operation a request journey performs on its entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Get,
    GetCollection,
    Post,
    Put,
    Patch,
    Delete,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Get => "get",
            Operation::GetCollection => "get_collection",
            Operation::Post => "post",
            Operation::Put => "put",
            Operation::Patch => "patch",
            Operation::Delete => "delete",
        }
    }

    /// Whether the operation leaves the entity untouched.
    pub fn is_read(&self) -> bool {
        matches!(self, Operation::Get | Operation::GetCollection)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Runtime tag naming the domain entity a journey concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct EntityKind(&'static str);

impl EntityKind {
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Caller identity carried by every capsule.
///
/// Child capsules inherit the identity of the capsule that spawned them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Identity {
    #[default]
    Anonymous,
    Named(String),
}

impl Identity {
    pub fn named(name: impl Into<String>) -> Self {
        Identity::Named(name.into())
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Identity::Anonymous => None,
            Identity::Named(name) => Some(name),
        }
    }

    pub fn is_anonymous(&self) -> bool {
        matches!(self, Identity::Anonymous)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identity::Anonymous => f.write_str("anonymous"),
            Identity::Named(name) => f.write_str(name),
        }
    }
}

/// Static description of one kind of request journey.
pub trait Shape: Send + Sync + 'static {
    /// Payload carried down through the descend phases.
    type Request: Send + Sync + 'static;
    /// Payload produced by the terminal and carried back up.
    type Response: Send + Sync + 'static;

    const OPERATION: Operation;
    const ENTITY: EntityKind;

    /// Human-readable label, e.g. `get price`.
    fn label() -> String {
        format!("{} {}", Self::OPERATION, Self::ENTITY)
    }
}

/// Declare a [`Shape`] marker type.
///
/// ```
/// use conduit::shape;
///
/// shape!(pub GetPrice => Get "price", String => u64);
///
/// assert_eq!(<GetPrice as conduit::Shape>::label(), "get price");
/// ```
#[macro_export]
macro_rules! shape {
    ($(#[$meta:meta])* $vis:vis $name:ident => $op:ident $entity:literal, $req:ty => $resp:ty) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default)]
        $vis struct $name;

        impl $crate::Shape for $name {
            type Request = $req;
            type Response = $resp;

            const OPERATION: $crate::Operation = $crate::Operation::$op;
            const ENTITY: $crate::EntityKind = $crate::EntityKind::new($entity);
        }
    };
}
