//! Scheduler / invoker (spec §4.6): drives a pool of workers that lease
//! ready threads from the controller, step them, and requeue or retire
//! them as appropriate. No priority ordering is guaranteed beyond the
//! controller's own FIFO-ish ready queue.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use hark_controller::DataController;
use hark_foreign::ForeignRegistry;
use hark_value::{CodeModel, HarkError, Thread, ThreadId, ThreadState, Value};

use crate::executor::{run_lease, StepOutcome};

#[derive(Clone, Copy, Debug)]
pub struct RuntimeConfig {
    /// Instructions executed per lease before the thread is committed back
    /// as `Ready` regardless of whether it would otherwise keep running.
    pub step_budget: usize,
    pub lease_timeout: Duration,
    pub worker_count: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig { step_budget: 10_000, lease_timeout: Duration::from_secs(30), worker_count: 4 }
    }
}

fn terminal_result(thread: &Thread) -> Result<Value, HarkError> {
    match &thread.state {
        ThreadState::Finished(v) => Ok(v.clone()),
        ThreadState::Errored(e) => Err(e.clone()),
        other => Err(HarkError::ControllerUnavailable(format!(
            "thread did not reach a terminal state (found {other:?})"
        ))),
    }
}

/// Single-machine mode: `config.worker_count` long-lived workers loop over
/// `lease_ready`/step/`commit_step`/`wake` against the same in-process
/// controller handle until `root_thread` reaches a terminal state.
pub async fn run_to_completion(
    controller: Arc<dyn DataController>,
    foreign: Arc<ForeignRegistry>,
    config: RuntimeConfig,
    root_thread: ThreadId,
) -> Result<Value, HarkError> {
    let code = controller.get_code().await?;
    let finished = Arc::new(AtomicBool::new(false));

    let mut workers = Vec::with_capacity(config.worker_count);
    for worker_id in 0..config.worker_count {
        let controller = controller.clone();
        let code = code.clone();
        let foreign = foreign.clone();
        let finished = finished.clone();
        workers.push(tokio::spawn(worker_loop(
            worker_id, controller, code, foreign, config, root_thread, finished,
        )));
    }
    for worker in workers {
        let _ = worker.await;
    }

    let thread = controller
        .read_thread(root_thread)
        .await
        .ok_or_else(|| HarkError::ControllerUnavailable(format!("unknown thread {root_thread}")))?;
    terminal_result(&thread)
}

async fn worker_loop(
    worker_id: usize,
    controller: Arc<dyn DataController>,
    code: Arc<CodeModel>,
    foreign: Arc<ForeignRegistry>,
    config: RuntimeConfig,
    root_thread: ThreadId,
    finished: Arc<AtomicBool>,
) {
    loop {
        if finished.load(Ordering::Acquire) {
            return;
        }
        match controller.lease_ready().await {
            Some(lease) => {
                let is_root = lease.thread.id == root_thread;
                match run_lease(controller.as_ref(), &code, &foreign, lease, config.step_budget).await {
                    Ok(StepOutcome::Finished(_) | StepOutcome::Errored(_)) if is_root => {
                        info!(worker_id, thread = ?root_thread, "root thread reached a terminal state");
                        finished.store(true, Ordering::Release);
                        return;
                    }
                    Ok(_) => {}
                    Err(err) => warn!(worker_id, error = %err, "step failed outside the program's own error handling"),
                }
            }
            None => {
                if finished.load(Ordering::Acquire) {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        }
    }
}

/// Distributed mode: each leased step is dispatched as its own spawned
/// task against the same shared controller handle, standing in for
/// "submitted to a remote executor" — the contract that matters here is
/// the sequence of controller API calls, not the transport carrying them.
pub async fn run_to_completion_distributed(
    controller: Arc<dyn DataController>,
    foreign: Arc<ForeignRegistry>,
    config: RuntimeConfig,
    root_thread: ThreadId,
) -> Result<Value, HarkError> {
    let code = controller.get_code().await?;
    let mut in_flight = tokio::task::JoinSet::new();

    loop {
        if let Some(thread) = controller.read_thread(root_thread).await {
            if thread.state.is_terminal() && in_flight.is_empty() {
                return terminal_result(&thread);
            }
        }
        match controller.lease_ready().await {
            Some(lease) => {
                let controller = controller.clone();
                let code = code.clone();
                let foreign = foreign.clone();
                let budget = config.step_budget;
                in_flight.spawn(async move {
                    if let Err(err) = run_lease(controller.as_ref(), &code, &foreign, lease, budget).await {
                        warn!(error = %err, "distributed step failed outside the program's own error handling");
                    }
                });
            }
            None => {
                if in_flight.is_empty() {
                    tokio::task::yield_now().await;
                } else {
                    in_flight.join_next().await;
                }
            }
        }
    }
}
