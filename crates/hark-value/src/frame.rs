//! Activation frames: the snapshot captured on `Call` and consumed on
//! `Return` (spec §3).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{Symbol, Value};

/// The caller a frame will return into: either another frame in the same
/// thread's call chain, or the thread's root.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameRef {
    Root,
    Frame(u64),
}

/// A snapshot sufficient to resume a suspended call. Frames are never
/// mutated after capture; `Return` consumes the top frame of the thread's
/// call chain to rebuild executor state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActivationFrame {
    pub id: u64,
    pub function_name: Symbol,
    pub return_ip: usize,
    pub operand_stack: Vec<Value>,
    pub locals: BTreeMap<Symbol, Value>,
    pub caller: FrameRef,
}
