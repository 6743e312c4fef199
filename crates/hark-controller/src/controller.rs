//! The `DataController` contract (spec §4.4, §9): the only way the executor
//! and scheduler ever observe or mutate thread/future/code state. Every
//! method here is a single atomic operation from the caller's point of
//! view; the executor is written once against this trait and never cares
//! whether `InMemoryController` or `SimulatedRemoteController` backs it.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;

use hark_value::{CodeModel, Future, FutureId, HarkError, Symbol, Thread, ThreadId, Value};

use crate::types::{Lease, StepToken};

#[async_trait]
pub trait DataController: Send + Sync {
    /// Seeds the controller with the program's compiled code. Called once,
    /// before any thread is created.
    async fn seed(&self, code: CodeModel);

    /// Returns the seeded code model. Panics (via `ControllerUnavailable`)
    /// if called before `seed`.
    async fn get_code(&self) -> Result<Arc<CodeModel>, HarkError>;

    /// Creates a new thread at the entry point of `function_name`, bound to
    /// a fresh terminal future. Returns `(thread_id, terminal_future_id)`.
    /// Safe to call mid-step (it touches only brand-new state, never an
    /// in-flight lease).
    async fn new_thread(
        &self,
        function_name: Symbol,
        locals: BTreeMap<Symbol, Value>,
    ) -> Result<(ThreadId, FutureId), HarkError>;

    /// Leases one ready thread for stepping, if any is available, flipping
    /// its state to `Running` and minting a fresh `StepToken`. Also reaps
    /// any lease whose timeout has elapsed, returning the thread to `Ready`
    /// first.
    async fn lease_ready(&self) -> Option<Lease>;

    /// Persists the result of stepping a leased thread that did not block
    /// (ready-to-continue, finished, errored, or budget-exceeded). Requires
    /// `token` to match the outstanding lease; idempotent under retry with
    /// the same token (spec §8 P5).
    async fn commit_step(
        &self,
        thread_id: ThreadId,
        token: StepToken,
        new_snapshot: Thread,
    ) -> Result<(), HarkError>;

    /// Persists a thread suspending on `Wait`: commits `new_snapshot`
    /// (state must be `Waiting(future_id)`) and appends the thread to the
    /// future's chain, atomically. Idempotent under retry with the same
    /// token.
    async fn block(
        &self,
        thread_id: ThreadId,
        token: StepToken,
        new_snapshot: Thread,
        future_id: FutureId,
    ) -> Result<(), HarkError>;

    /// Resolves a future with `value`, draining and returning its wait
    /// chain. Errors with `DoubleResolve` if already resolved. Safe to call
    /// mid-step (the future being resolved is never the stepping thread's
    /// own lease).
    async fn resolve(&self, future_id: FutureId, value: Value) -> Result<Vec<ThreadId>, HarkError>;

    /// Wakes each listed thread: reads the now-resolved value of
    /// `future_id`, pushes it onto the thread's operand stack (where `Wait`
    /// suspended) and transitions it from `Waiting` to `Ready`.
    async fn wake(&self, future_id: FutureId, thread_ids: &[ThreadId]) -> Result<(), HarkError>;

    /// Reads a future's current record without taking a lease on anything.
    async fn read_future(&self, future_id: FutureId) -> Option<Future>;

    /// Reads a thread's current record without taking a lease.
    async fn read_thread(&self, thread_id: ThreadId) -> Option<Thread>;
}
