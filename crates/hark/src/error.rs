use thiserror::Error;

use hark_compiler::CompileError;
use hark_value::HarkError;

/// Errors a `Program` embedder can see: either the compiler rejected the
/// tree, or the runtime itself hit a controller-level failure (spec §7's
/// `LeaseLost`/`ControllerUnavailable`/`MalformedCode` are the only
/// `HarkError` variants that can surface here without having first gone
/// through a program's own `errored` outcome).
#[derive(Debug, Error)]
pub enum ProgramError {
    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Runtime(#[from] HarkError),
}
