//! `Program`: the one call site an embedder or the CLI needs (spec.md §2's
//! "seeded Data controller → Scheduler hands threads to Executors"
//! pipeline, collapsed into a handful of methods).

use std::sync::Arc;

use tracing::info;

use hark_controller::{DataController, InMemoryController, SimulatedRemoteController};
use hark_foreign::ForeignRegistry;
use hark_value::{HarkError, Symbol, ThreadId, Value};
use hark_vm::RuntimeConfig;

use crate::error::ProgramError;

/// Which `DataController` implementation backs a run. `Local` is an
/// in-process mutex-guarded store (single-machine mode, spec §4.6);
/// `SimulatedRemote` models the conditional-write contract a real
/// transactional store would impose (distributed mode) without standing
/// up an actual network service (spec §9, "controller abstraction").
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ControllerKind {
    #[default]
    Local,
    SimulatedRemote,
}

/// A compiled, seeded Hark program ready to spawn root threads against.
pub struct Program {
    controller: Arc<dyn DataController>,
    foreign: Arc<ForeignRegistry>,
    config: RuntimeConfig,
}

impl Program {
    /// Compiles `tree`, builds a controller of the requested kind, and
    /// seeds it with the resulting code model.
    pub async fn compile_and_seed(
        tree: &hark_compiler::ProgramTree,
        foreign: ForeignRegistry,
        config: RuntimeConfig,
        controller_kind: ControllerKind,
    ) -> Result<Self, ProgramError> {
        let code = hark_compiler::compile(tree)?;
        let controller: Arc<dyn DataController> = match controller_kind {
            ControllerKind::Local => {
                Arc::new(InMemoryController::with_lease_timeout(config.lease_timeout))
            }
            ControllerKind::SimulatedRemote => {
                Arc::new(SimulatedRemoteController::with_lease_timeout(config.lease_timeout))
            }
        };
        controller.seed(code).await;
        Ok(Program { controller, foreign: Arc::new(foreign), config })
    }

    /// Registers a foreign function with this program's bridge before any
    /// thread that calls it runs. `name` and `arity` are the qualified
    /// name/arity pair `Import` bindings in the source resolve to.
    pub fn register_foreign(
        &mut self,
        name: impl Into<Symbol>,
        arity: u8,
        f: impl Fn(&[Value]) -> Result<Value, HarkError> + Send + Sync + 'static,
    ) -> Result<(), hark_foreign::ForeignRegistryError> {
        Arc::get_mut(&mut self.foreign)
            .expect("register_foreign must run before any thread is spawned")
            .register(name, arity, f)
    }

    /// Spawns a new thread at `function_name`'s entry, binding `args` to
    /// its declared parameters in order. Returns the thread id (pass it to
    /// `run_to_completion`/`run_to_completion_distributed` to drive it, or
    /// `await` its terminal future's id from another thread).
    pub async fn spawn_root(
        &self,
        function_name: impl Into<Symbol>,
        args: Vec<Value>,
    ) -> Result<ThreadId, HarkError> {
        let function_name = function_name.into();
        let code = self.controller.get_code().await?;
        let meta = code
            .function(&function_name)
            .ok_or_else(|| HarkError::UndefinedFunction(function_name.to_string()))?;
        if meta.params.len() != args.len() {
            return Err(HarkError::ArityMismatch {
                name: function_name.to_string(),
                expected: meta.params.len() as u8,
                got: args.len() as u8,
            });
        }
        let locals = meta.params.iter().cloned().zip(args).collect();
        let (thread_id, _terminal_future) = self.controller.new_thread(function_name, locals).await?;
        Ok(thread_id)
    }

    /// Drives `root` to completion on a single-machine worker pool (spec
    /// §4.6 single-machine mode), returning its terminal value or the
    /// reason it errored.
    pub async fn run_to_completion(&self, root: ThreadId) -> Result<Value, HarkError> {
        info!(thread = ?root, mode = "single-machine", "running program to completion");
        hark_vm::run_to_completion(self.controller.clone(), self.foreign.clone(), self.config, root).await
    }

    /// Drives `root` to completion dispatching each step as its own task
    /// against the shared controller (spec §4.6 distributed mode).
    pub async fn run_to_completion_distributed(&self, root: ThreadId) -> Result<Value, HarkError> {
        info!(thread = ?root, mode = "distributed", "running program to completion");
        hark_vm::run_to_completion_distributed(self.controller.clone(), self.foreign.clone(), self.config, root)
            .await
    }

    /// Convenience: spawns `function_name(args)` as root and drives it to
    /// completion on a single-machine worker pool.
    pub async fn run(
        &self,
        function_name: impl Into<Symbol>,
        args: Vec<Value>,
    ) -> Result<Value, ProgramError> {
        let root = self.spawn_root(function_name, args).await?;
        Ok(self.run_to_completion(root).await?)
    }

    /// Convenience: spawns `function_name(args)` as root and drives it to
    /// completion in distributed mode.
    pub async fn run_distributed(
        &self,
        function_name: impl Into<Symbol>,
        args: Vec<Value>,
    ) -> Result<Value, ProgramError> {
        let root = self.spawn_root(function_name, args).await?;
        Ok(self.run_to_completion_distributed(root).await?)
    }

    /// The controller backing this program, for embedders that need to
    /// read thread/future state directly (e.g. to await a non-root
    /// future's terminal value from outside the runtime).
    pub fn controller(&self) -> &Arc<dyn DataController> {
        &self.controller
    }
}
