//! A `DataController` that models the conditional-write contract a real
//! remote store would impose (spec §6: "all updates conditional on
//! currently observed record version"), without fabricating a network
//! client. Internally it shares `InMemoryController`'s table logic; the
//! difference is purely in the CAS bookkeeping each write goes through
//! (see `ControllerCore::bump`) and the tracing it emits, so a future swap
//! to a genuine remote client changes only this file.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use hark_value::{CodeModel, Future, FutureId, HarkError, Symbol, Thread, ThreadId, Value};

use crate::controller::DataController;
use crate::state::{ControllerCore, Style};
use crate::types::{Lease, StepToken};

const DEFAULT_LEASE_TIMEOUT: Duration = Duration::from_secs(30);

pub struct SimulatedRemoteController {
    core: ControllerCore,
}

impl SimulatedRemoteController {
    pub fn new() -> Self {
        SimulatedRemoteController { core: ControllerCore::new(Style::SimulatedRemote, DEFAULT_LEASE_TIMEOUT) }
    }

    pub fn with_lease_timeout(lease_timeout: Duration) -> Self {
        SimulatedRemoteController { core: ControllerCore::new(Style::SimulatedRemote, lease_timeout) }
    }
}

impl Default for SimulatedRemoteController {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DataController for SimulatedRemoteController {
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
