//! A single-process `DataController` backed by mutex-guarded maps. This is
//! the controller used by `Program::run_to_completion` (spec §4.6
//! single-machine mode).

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use hark_value::{CodeModel, Future, FutureId, HarkError, Symbol, Thread, ThreadId, Value};

use crate::controller::DataController;
use crate::state::{ControllerCore, Style};
use crate::types::{Lease, StepToken};

const DEFAULT_LEASE_TIMEOUT: Duration = Duration::from_secs(30);

pub struct InMemoryController {
    core: ControllerCore,
}

impl InMemoryController {
    pub fn new() -> Self {
        InMemoryController { core: ControllerCore::new(Style::InMemory, DEFAULT_LEASE_TIMEOUT) }
    }

    pub fn with_lease_timeout(lease_timeout: Duration) -> Self {
        InMemoryController { core: ControllerCore::new(Style::InMemory, lease_timeout) }
    }
}

impl Default for InMemoryController {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DataController for InMemoryController {
    async fn seed(&self, code: CodeModel) {
        self.core.seed(code)
    }

    async fn get_code(&self) -> Result<Arc<CodeModel>, HarkError> {
        self.core.get_code()
    }

    async fn new_thread(
        &self,
        function_name: Symbol,
        locals: BTreeMap<Symbol, Value>,
    ) -> Result<(ThreadId, FutureId), HarkError> {
        self.core.new_thread(function_name, locals)
    }

    async fn lease_ready(&self) -> Option<Lease> {
        self.core.lease_ready()
    }

    async fn commit_step(
        &self,
        thread_id: ThreadId,
        token: StepToken,
        new_snapshot: Thread,
    ) -> Result<(), HarkError> {
        self.core.commit_step(thread_id, token, new_snapshot)
    }

    async fn block(
        &self,
        thread_id: ThreadId,
        token: StepToken,
        new_snapshot: Thread,
        future_id: FutureId,
    ) -> Result<(), HarkError> {
        self.core.block(thread_id, token, new_snapshot, future_id)
    }

    async fn resolve(&self, future_id: FutureId, value: Value) -> Result<Vec<ThreadId>, HarkError> {
        self.core.resolve(future_id, value)
    }

    async fn wake(&self, future_id: FutureId, thread_ids: &[ThreadId]) -> Result<(), HarkError> {
        self.core.wake(future_id, thread_ids)
    }

    async fn read_future(&self, future_id: FutureId) -> Option<Future> {
        self.core.read_future(future_id)
    }

    async fn read_thread(&self, thread_id: ThreadId) -> Option<Thread> {
        self.core.read_thread(thread_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hark_value::{FunctionMeta, Instruction, ThreadState};

    fn sample_code() -> CodeModel {
        let mut functions = std::collections::BTreeMap::new();
        functions.insert(
            Symbol::new("main"),
            FunctionMeta { entry: 0, arity: 0, params: vec![], free_vars: vec![] },
        );
        CodeModel::new(vec![Instruction::PushL(Value::Integer(1)), Instruction::Return], functions)
    }

    #[tokio::test]
    async fn new_thread_requires_seeded_code() {
        let ctrl = InMemoryController::new();
        let err = ctrl.new_thread(Symbol::new("main"), BTreeMap::new()).await.unwrap_err();
        assert_eq!(err, HarkError::ControllerUnavailable("code not seeded".into()));
    }

    #[tokio::test]
    async fn lease_commit_roundtrip() {
        let ctrl = InMemoryController::new();
        ctrl.seed(sample_code()).await;
        let (thread_id, _future_id) = ctrl.new_thread(Symbol::new("main"), BTreeMap::new()).await.unwrap();

        let lease = ctrl.lease_ready().await.expect("thread should be ready");
        assert_eq!(lease.thread.id, thread_id);

        let mut snapshot = lease.thread.clone();
        snapshot.state = ThreadState::Finished(Value::Integer(1));
        ctrl.commit_step(thread_id, lease.token, snapshot).await.unwrap();

        assert!(ctrl.lease_ready().await.is_none());
        let read = ctrl.read_thread(thread_id).await.unwrap();
        assert_eq!(read.state, ThreadState::Finished(Value::Integer(1)));
    }

    #[tokio::test]
    async fn commit_step_is_idempotent_under_retry() {
        let ctrl = InMemoryController::new();
        ctrl.seed(sample_code()).await;
        let (thread_id, _) = ctrl.new_thread(Symbol::new("main"), BTreeMap::new()).await.unwrap();
        let lease = ctrl.lease_ready().await.unwrap();

        let mut snapshot = lease.thread.clone();
        snapshot.state = ThreadState::Finished(Value::Integer(7));
        ctrl.commit_step(thread_id, lease.token, snapshot.clone()).await.unwrap();
        // Redelivery of the same dispatch (same token) must be a no-op, not
        // an error, even though the lease is already gone.
        ctrl.commit_step(thread_id, lease.token, snapshot).await.unwrap();
    }

    #[tokio::test]
    async fn commit_step_with_stale_token_is_lease_lost() {
        let ctrl = InMemoryController::new();
        ctrl.seed(sample_code()).await;
        let (thread_id, _) = ctrl.new_thread(Symbol::new("main"), BTreeMap::new()).await.unwrap();
        let lease = ctrl.lease_ready().await.unwrap();
        let stale_token = StepToken(lease.token.0 + 999);

        let mut snapshot = lease.thread.clone();
        snapshot.state = ThreadState::Finished(Value::Integer(1));
        let err = ctrl.commit_step(thread_id, stale_token, snapshot).await.unwrap_err();
        assert_eq!(err, HarkError::LeaseLost(thread_id));
    }

    #[tokio::test]
    async fn resolve_then_wake_injects_value_and_readies_waiter() {
        let ctrl = InMemoryController::new();
        ctrl.seed(sample_code()).await;
        let (waiter_id, _waiter_future) =
            ctrl.new_thread(Symbol::new("main"), BTreeMap::new()).await.unwrap();
        let lease = ctrl.lease_ready().await.unwrap();
        let (_producer_id, producer_future) =
            ctrl.new_thread(Symbol::new("main"), BTreeMap::new()).await.unwrap();

        let mut waiting = lease.thread.clone();
        waiting.state = ThreadState::Waiting(producer_future);
        ctrl.block(waiter_id, lease.token, waiting, producer_future).await.unwrap();

        let woken = ctrl.resolve(producer_future, Value::Integer(42)).await.unwrap();
        assert_eq!(woken, vec![waiter_id]);
        ctrl.wake(producer_future, &woken).await.unwrap();

        let resumed = ctrl.read_thread(waiter_id).await.unwrap();
        assert_eq!(resumed.state, ThreadState::Ready);
        assert_eq!(resumed.operand_stack.last(), Some(&Value::Integer(42)));
    }

    #[tokio::test]
    async fn double_resolve_is_rejected() {
        let ctrl = InMemoryController::new();
        ctrl.seed(sample_code()).await;
        let (_thread_id, future_id) =
            ctrl.new_thread(Symbol::new("main"), BTreeMap::new()).await.unwrap();
        ctrl.resolve(future_id, Value::Integer(1)).await.unwrap();
        let err = ctrl.resolve(future_id, Value::Integer(2)).await.unwrap_err();
        assert_eq!(err, HarkError::DoubleResolve);
    }
}
