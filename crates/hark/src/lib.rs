//! Hark: a language whose `async` function application and `await` are
//! first-class constructs, designed to run identically across local
//! threads and ephemeral serverless compute.
//!
//! This crate is the facade over the runtime's components — compiler,
//! data controller, thread executor, scheduler — wired into one
//! `Program` entry point (spec.md §2). Embedders and `hark-cli` should
//! depend on this crate rather than the satellite crates directly unless
//! they need to swap a component (e.g. a custom `DataController`).

mod error;
mod program;

pub use error::ProgramError;
pub use program::{ControllerKind, Program};

pub use hark_compiler::{compile, CompileError, Expr, FunctionDef, Primitive, ProgramTree};
pub use hark_controller::{DataController, InMemoryController, SimulatedRemoteController};
pub use hark_foreign::{ForeignFn, ForeignRegistry, ForeignRegistryError};
pub use hark_value::{
    ActivationFrame, CodeModel, Future, FutureId, HarkError, Symbol, Thread, ThreadId, ThreadState,
    Value,
};
pub use hark_vm::RuntimeConfig;
