use hark_value::Symbol;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ForeignRegistryError {
    #[error("foreign function {0}/{1} is already registered")]
    AlreadyRegistered(Symbol, u8),
}
