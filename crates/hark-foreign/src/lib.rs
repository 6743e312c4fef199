//! The foreign bridge (spec §4.7): a registry of host-callable functions,
//! keyed by qualified name and exact arity, invoked synchronously from
//! inside a single executor step.

mod error;
mod registry;

pub use error::ForeignRegistryError;
pub use registry::{ForeignFn, ForeignRegistry};
