//! `ForeignRegistry`: the only door between Hark code and host functions.
//!
//! There is no reflective discovery — a foreign function exists to Hark
//! code only once something has called [`ForeignRegistry::register`] with
//! its qualified name and exact arity (spec §4.7, §9 design note). Foreign
//! calls run synchronously inside a single executor step and are handed no
//! controller handle, so they cannot spawn threads, block, or otherwise
//! re-enter the controller.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::trace;

use hark_value::{HarkError, Symbol, Value};

use crate::error::ForeignRegistryError;

pub type ForeignFn = Arc<dyn Fn(&[Value]) -> Result<Value, HarkError> + Send + Sync>;

#[derive(Clone, Default)]
pub struct ForeignRegistry {
    functions: HashMap<(Symbol, u8), ForeignFn>,
}

impl ForeignRegistry {
    pub fn new() -> Self {
        ForeignRegistry { functions: HashMap::new() }
    }

    /// Registers `name/arity`. Returns an error if that exact name/arity
    /// pair is already bound — re-registration is never silent overwrite.
    pub fn register(
        &mut self,
        name: impl Into<Symbol>,
        arity: u8,
        f: impl Fn(&[Value]) -> Result<Value, HarkError> + Send + Sync + 'static,
    ) -> Result<(), ForeignRegistryError> {
        let name = name.into();
        let key = (name.clone(), arity);
        if self.functions.contains_key(&key) {
            return Err(ForeignRegistryError::AlreadyRegistered(name, arity));
        }
        self.functions.insert(key, Arc::new(f));
        Ok(())
    }

    pub fn is_registered(&self, name: &Symbol, arity: u8) -> bool {
        self.functions.contains_key(&(name.clone(), arity))
    }

    /// Invokes `name/arity` with `args`. `ArityMismatch` if a function of
    /// that name exists under a different arity; `UndefinedFunction` if no
    /// foreign function of that name exists at all.
    pub fn call(&self, name: &Symbol, args: &[Value]) -> Result<Value, HarkError> {
        let arity = args.len() as u8;
        if let Some(f) = self.functions.get(&(name.clone(), arity)) {
            trace!(%name, arity, "calling foreign function");
            return f(args);
        }
        if let Some(((_, other_arity), _)) = self.functions.iter().find(|((n, _), _)| n == name) {
            return Err(HarkError::ArityMismatch {
                name: name.to_string(),
                expected: *other_arity,
                got: arity,
            });
        }
        Err(HarkError::UndefinedFunction(name.to_string()))
    }
}
