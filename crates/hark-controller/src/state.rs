//! Shared table bookkeeping used by both `InMemoryController` and
//! `SimulatedRemoteController`. Neither implementation hands out a
//! reference into this state; every read clones out, matching the
//! boundary a real remote store would impose.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, warn};

use hark_value::{
    as_error_marker, CodeModel, Future, FutureId, HarkError, Symbol, Thread, ThreadId, ThreadState, Value,
};

use crate::types::{Lease, StepToken};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Style {
    InMemory,
    SimulatedRemote,
}

struct LeaseInfo {
    token: StepToken,
    expires_at: Instant,
}

struct ThreadRecord {
    thread: Thread,
    version: u64,
    lease: Option<LeaseInfo>,
    last_committed_token: Option<StepToken>,
}

struct FutureRecord {
    future: Future,
    version: u64,
}

#[derive(Default)]
struct Tables {
    code: Option<Arc<CodeModel>>,
    threads: HashMap<ThreadId, ThreadRecord>,
    futures: HashMap<FutureId, FutureRecord>,
    next_thread: u64,
    next_future: u64,
    next_token: u64,
    ready_queue: Vec<ThreadId>,
}

pub(crate) struct ControllerCore {
    style: Style,
    lease_timeout: Duration,
    tables: Mutex<Tables>,
}

impl ControllerCore {
    pub(crate) fn new(style: Style, lease_timeout: Duration) -> Self {
        ControllerCore { style, lease_timeout, tables: Mutex::new(Tables::default()) }
    }

    fn bump(&self, version: u64) -> u64 {
        // A real remote store would reject the write if the version it
        // observed no longer matches the stored one (a compare-and-set).
        // Under a single process mutex no such race is observable, but the
        // simulated controller still goes through the motions so its call
        // shape matches what a networked implementation would need.
        if self.style == Style::SimulatedRemote {
            debug!(version, "simulated compare-and-set write");
        }
        version + 1
    }

    pub(crate) fn seed(&self, code: CodeModel) {
        self.tables.lock().code = Some(Arc::new(code));
    }

    pub(crate) fn get_code(&self) -> Result<Arc<CodeModel>, HarkError> {
        self.tables
            .lock()
            .code
            .clone()
            .ok_or_else(|| HarkError::ControllerUnavailable("code not seeded".into()))
    }

    pub(crate) fn new_thread(
        &self,
        function_name: Symbol,
        locals: std::collections::BTreeMap<Symbol, Value>,
    ) -> Result<(ThreadId, FutureId), HarkError> {
        let mut tables = self.tables.lock();
        let code = tables
            .code
            .clone()
            .ok_or_else(|| HarkError::ControllerUnavailable("code not seeded".into()))?;
        let meta = code
            .function(&function_name)
            .ok_or_else(|| HarkError::UndefinedFunction(function_name.to_string()))?;
        if locals.len() != meta.arity as usize {
            return Err(HarkError::ArityMismatch {
                name: function_name.to_string(),
                expected: meta.arity,
                got: locals.len() as u8,
            });
        }
        let entry = meta.entry;

        let future_id = FutureId(tables.next_future);
        tables.next_future += 1;
        tables.futures.insert(future_id, FutureRecord { future: Future::new(future_id), version: 0 });

        let thread_id = ThreadId(tables.next_thread);
        tables.next_thread += 1;
        let thread = Thread::new(thread_id, function_name, entry, locals, future_id);
        tables.threads.insert(
            thread_id,
            ThreadRecord { thread, version: 0, lease: None, last_committed_token: None },
        );
        tables.ready_queue.push(thread_id);
        Ok((thread_id, future_id))
    }

    pub(crate) fn lease_ready(&self) -> Option<Lease> {
        let mut tables = self.tables.lock();
        let now = Instant::now();

        // Reap any expired lease, returning that thread to the ready queue.
        let expired: Vec<ThreadId> = tables
            .threads
            .iter()
            .filter_map(|(id, rec)| match &rec.lease {
                Some(l) if l.expires_at <= now => Some(*id),
                _ => None,
            })
            .collect();
        for id in expired {
            warn!(thread = ?id, "lease expired, returning thread to ready queue");
            if let Some(rec) = tables.threads.get_mut(&id) {
                rec.lease = None;
                rec.thread.state = ThreadState::Ready;
            }
            tables.ready_queue.push(id);
        }

        while let Some(id) = tables.ready_queue.pop() {
            let Some(rec) = tables.threads.get_mut(&id) else { continue };
            if rec.thread.state != ThreadState::Ready {
                continue;
            }
            let token = StepToken(tables.next_token);
            tables.next_token += 1;
            rec.thread.state = ThreadState::Running;
            rec.lease = Some(LeaseInfo { token, expires_at: now + self.lease_timeout });
            return Some(Lease { thread: rec.thread.clone(), token });
        }
        None
    }

    fn check_lease(
        &self,
        tables: &Tables,
        thread_id: ThreadId,
        token: StepToken,
    ) -> Result<bool, HarkError> {
        let rec = tables
            .threads
            .get(&thread_id)
            .ok_or_else(|| HarkError::ControllerUnavailable(format!("unknown thread {thread_id}")))?;
        if rec.last_committed_token == Some(token) {
            return Ok(false); // already applied, caller should no-op
        }
        match &rec.lease {
            Some(l) if l.token == token => Ok(true),
            _ => Err(HarkError::LeaseLost(thread_id)),
        }
    }

    pub(crate) fn commit_step(
        &self,
        thread_id: ThreadId,
        token: StepToken,
        new_snapshot: Thread,
    ) -> Result<(), HarkError> {
        let mut tables = self.tables.lock();
        if !self.check_lease(&tables, thread_id, token)? {
            return Ok(());
        }
        let requeue = new_snapshot.state == ThreadState::Ready;
        let rec = tables.threads.get_mut(&thread_id).expect("checked above");
        let version = self.bump(rec.version);
        rec.version = version;
        rec.thread = new_snapshot;
        rec.lease = None;
        rec.last_committed_token = Some(token);
        if requeue {
            tables.ready_queue.push(thread_id);
        }
        Ok(())
    }

    pub(crate) fn block(
        &self,
        thread_id: ThreadId,
        token: StepToken,
        new_snapshot: Thread,
        future_id: FutureId,
    ) -> Result<(), HarkError> {
        if new_snapshot.state != ThreadState::Waiting(future_id) {
            return Err(HarkError::MalformedCode(
                "block() requires new_snapshot.state == Waiting(future_id)".into(),
            ));
        }
        let mut tables = self.tables.lock();
        if !self.check_lease(&tables, thread_id, token)? {
            return Ok(());
        }
        tables
            .futures
            .get_mut(&future_id)
            .ok_or_else(|| HarkError::ControllerUnavailable(format!("unknown future {future_id}")))?
            .future
            .chain
            .push(thread_id);

        let rec = tables.threads.get_mut(&thread_id).expect("checked above");
        let version = self.bump(rec.version);
        rec.version = version;
        rec.thread = new_snapshot;
        rec.lease = None;
        rec.last_committed_token = Some(token);
        Ok(())
    }

    pub(crate) fn resolve(&self, future_id: FutureId, value: Value) -> Result<Vec<ThreadId>, HarkError> {
        let mut tables = self.tables.lock();
        let rec = tables
            .futures
            .get_mut(&future_id)
            .ok_or_else(|| HarkError::ControllerUnavailable(format!("unknown future {future_id}")))?;
        if rec.future.resolved {
            return Err(HarkError::DoubleResolve);
        }
        rec.future.resolved = true;
        rec.future.value = Some(value);
        let chain = std::mem::take(&mut rec.future.chain);
        rec.version = self.bump(rec.version);
        Ok(chain)
    }

    /// Wakes `thread_ids`, which are all blocked on `future_id`. If the
    /// future resolved to a propagated error, a woken thread never resumes:
    /// `Wait` on an errored future always errors the waiter immediately
    /// (spec §7, "error Values flow through await"), so this short-circuits
    /// straight to `Errored` and resolves the waiter's own terminal future
    /// with the same marker, cascading to whatever awaits *that* future in
    /// turn. The cascade stays inside this single lock acquisition — `wake`
    /// and `resolve` both lock `tables`, and `parking_lot::Mutex` is not
    /// reentrant.
    pub(crate) fn wake(&self, future_id: FutureId, thread_ids: &[ThreadId]) -> Result<(), HarkError> {
        let mut tables = self.tables.lock();
        let mut pending: Vec<(FutureId, Vec<ThreadId>)> = vec![(future_id, thread_ids.to_vec())];

        while let Some((future_id, ids)) = pending.pop() {
            let value = tables
                .futures
                .get(&future_id)
                .and_then(|r| r.future.value.clone())
                .ok_or_else(|| HarkError::ControllerUnavailable(format!("future {future_id} not resolved")))?;
            let propagated = as_error_marker(&value);

            for id in ids {
                let Some(rec) = tables.threads.get_mut(&id) else { continue };
                rec.version = self.bump(rec.version);

                if let Some(err) = &propagated {
                    rec.thread.state = ThreadState::Errored(err.clone());
                    let terminal_future = rec.thread.terminal_future;
                    if let Some(frec) = tables.futures.get_mut(&terminal_future) {
                        if !frec.future.resolved {
                            frec.future.resolved = true;
                            frec.future.value = Some(value.clone());
                            let chain = std::mem::take(&mut frec.future.chain);
                            frec.version = self.bump(frec.version);
                            if !chain.is_empty() {
                                pending.push((terminal_future, chain));
                            }
                        }
                    }
                } else {
                    rec.thread.operand_stack.push(value.clone());
                    rec.thread.state = ThreadState::Ready;
                    tables.ready_queue.push(id);
                }
            }
        }
        Ok(())
    }

    pub(crate) fn read_future(&self, future_id: FutureId) -> Option<Future> {
        self.tables.lock().futures.get(&future_id).map(|r| r.future.clone())
    }

    pub(crate) fn read_thread(&self, thread_id: ThreadId) -> Option<Thread> {
        self.tables.lock().threads.get(&thread_id).map(|r| r.thread.clone())
    }
}
