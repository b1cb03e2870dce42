//! Job-priority plugin state machine: the in-memory association/queue/bank
//! model, the lifecycle engine driving `job.validate`/`new`/`depend`/
//! `priority`/`run`/`inactive`, the independent compute-hours accumulator,
//! and the JSON-RPC shapes exchanged with the host.

pub mod compute_hours;
pub mod engine;
pub mod error;
pub mod model;
pub mod rpc;

pub use compute_hours::ComputeHoursEngine;
pub use engine::{PriorityEngine, PriorityWeights, SharedEngine};
pub use error::{PriorityError, RejectReason};
