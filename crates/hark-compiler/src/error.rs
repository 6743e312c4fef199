use hark_value::Symbol;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    #[error("function {0} is defined more than once")]
    DuplicateFunction(Symbol),

    #[error("call to undefined function {0}")]
    UndefinedFunction(Symbol),

    #[error("`async` of foreign binding {0} is rejected: foreign calls are synchronous")]
    AsyncOfForeign(Symbol),

    #[error("record literal has duplicate key {0}")]
    DuplicateRecordKey(Symbol),
}
