//! The transactional data controller (spec §4.4, §6, §9): the authoritative
//! store of threads, futures and code, exposed behind one trait so the
//! executor and scheduler are written once regardless of which concrete
//! implementation backs a run.

mod controller;
mod in_memory;
mod simulated_remote;
mod state;
mod types;

pub use controller::DataController;
pub use in_memory::InMemoryController;
pub use simulated_remote::SimulatedRemoteController;
pub use types::{Lease, StepToken};
