//! Lease tokens and the leased-thread handle returned by `lease_ready`.

use serde::{Deserialize, Serialize};

use hark_value::Thread;

/// Opaque token identifying one dispatch attempt at running a thread's next
/// step. The scheduler mints a fresh token when it first dispatches a lease
/// and resends the *same* token on retry, so `commit_step`/`block` can tell
/// a redelivered request (no-op) apart from a genuinely new step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StepToken(pub u64);

/// A thread leased out to an executor, plus the token it must present back
/// to `commit_step`/`block` to persist the result of stepping it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Lease {
    pub thread: Thread,
    pub token: StepToken,
}
