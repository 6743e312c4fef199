//! Tagged value, code, frame, thread and future model shared by the Hark
//! compiler and runtime.
//!
//! Nothing in this crate touches the controller, executor or scheduler —
//! it exists purely so every other crate agrees on one definition of
//! "what a value, a function, an activation frame, a thread and a future
//! are", matching invariants I1–I5 of the runtime specification.

mod code;
mod error;
mod error_marker;
mod frame;
mod future;
mod ids;
mod symbol;
mod thread;
mod value;

pub use code::{CodeModel, FunctionMeta, Instruction};
pub use error::HarkError;
pub use error_marker::{as_error_marker, error_marker};
pub use frame::{ActivationFrame, FrameRef};
pub use future::Future;
pub use ids::{FutureId, ThreadId};
pub use symbol::Symbol;
pub use thread::{Thread, ThreadState};
pub use value::Value;
