//! Error kinds raised by compilation, execution and the data controller.
//!
//! See spec §7: executor-level errors mark a thread `errored` and flow
//! through `await`; controller-level errors (`LeaseLost`,
//! `ControllerUnavailable`) are retried or aborted by the scheduler rather
//! than surfaced to the program.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ThreadId;

#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum HarkError {
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    #[error("arity mismatch calling {name}: expected {expected} argument(s), got {got}")]
    ArityMismatch { name: String, expected: u8, got: u8 },

    #[error("unbound name: {0}")]
    UnboundName(String),

    #[error("undefined function: {0}")]
    UndefinedFunction(String),

    #[error("division by zero")]
    DivisionByZero,

    #[error("foreign error: {0}")]
    ForeignError(String),

    #[error("future already resolved")]
    DoubleResolve,

    #[error("lease lost for thread {0:?}")]
    LeaseLost(ThreadId),

    #[error("controller unavailable: {0}")]
    ControllerUnavailable(String),

    #[error("malformed code: {0}")]
    MalformedCode(String),
}

impl HarkError {
    pub fn type_mismatch(expected: impl Into<String>, found: impl Into<String>) -> Self {
        HarkError::TypeMismatch { expected: expected.into(), found: found.into() }
    }
}
