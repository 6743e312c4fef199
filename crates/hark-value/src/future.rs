//! Futures: write-once cells produced by `async` and consumed by `await`
//! (spec §3).

use serde::{Deserialize, Serialize};

use crate::{FutureId, ThreadId, Value};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Future {
    pub id: FutureId,
    pub resolved: bool,
    pub value: Option<Value>,
    /// Threads currently blocked in `Wait` on this future.
    pub chain: Vec<ThreadId>,
}

impl Future {
    pub fn new(id: FutureId) -> Self {
        Future { id, resolved: false, value: None, chain: Vec::new() }
    }
}
