//! Threads: independently schedulable interpreter states (spec §3).
//!
//! A thread is "lightweight continuation", not an OS thread — its entire
//! state (operand stack, locals, instruction pointer, call chain) lives in
//! this struct so it can be leased out to an executor, stepped, and
//! committed back to the controller without ever leaving plain data.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{ActivationFrame, FrameRef, FutureId, HarkError, Symbol, ThreadId, Value};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ThreadState {
    Ready,
    Running,
    Waiting(FutureId),
    Finished(Value),
    Errored(HarkError),
}

impl ThreadState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ThreadState::Finished(_) | ThreadState::Errored(_))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Thread {
    pub id: ThreadId,
    pub state: ThreadState,
    pub function_name: Symbol,
    pub ip: usize,
    pub operand_stack: Vec<Value>,
    pub locals: BTreeMap<Symbol, Value>,
    /// The call chain: frames pushed by `Call`, most recent caller last.
    pub frames: Vec<ActivationFrame>,
    /// The future resolved when this thread finishes or errors.
    pub terminal_future: FutureId,
    next_frame_id: u64,
}

impl Thread {
    pub fn new(
        id: ThreadId,
        function_name: Symbol,
        entry: usize,
        locals: BTreeMap<Symbol, Value>,
        terminal_future: FutureId,
    ) -> Self {
        Thread {
            id,
            state: ThreadState::Ready,
            function_name,
            ip: entry,
            operand_stack: Vec::new(),
            locals,
            frames: Vec::new(),
            terminal_future,
            next_frame_id: 0,
        }
    }

    /// Captures the *caller's* current state (this thread's function name,
    /// stack and locals, as they stand before the call) into a new
    /// activation frame, and returns the `FrameRef` the callee should chain
    /// to. `return_ip` is the instruction to resume at when this frame is
    /// later popped.
    pub fn push_frame(&mut self, return_ip: usize) -> FrameRef {
        let caller = match self.frames.last() {
            Some(f) => FrameRef::Frame(f.id),
            None => FrameRef::Root,
        };
        let id = self.next_frame_id;
        self.next_frame_id += 1;
        let frame = ActivationFrame {
            id,
            function_name: self.function_name.clone(),
            return_ip,
            operand_stack: std::mem::take(&mut self.operand_stack),
            locals: std::mem::take(&mut self.locals),
            caller,
        };
        self.frames.push(frame);
        FrameRef::Frame(id)
    }

    /// Pops the top frame, restoring this thread's stack/locals/ip from it.
    /// Returns `None` if there is no frame to pop (i.e. this is the root
    /// frame and `Return` should finish the thread instead).
    pub fn pop_frame(&mut self) -> Option<()> {
        let frame = self.frames.pop()?;
        self.ip = frame.return_ip;
        self.operand_stack = frame.operand_stack;
        self.locals = frame.locals;
        self.function_name = frame.function_name;
        Some(())
    }
}
