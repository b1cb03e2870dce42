//! In-memory association/queue/bank/job tables (spec.md §3), grounded on
//! `original_source/src/plugins/accounting.hpp`, `job.hpp`, and
//! `compute_hours_limits.cpp`'s sibling `Job` type.

use std::collections::{HashMap, HashSet};

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

/// A submitted job's user id, as carried through jobtap callbacks.
pub type UserId = i64;
/// A job identifier. Kept signed and 64-bit to mirror `flux_jobid_t`.
pub type JobId = i64;

/// Dependency name attached when the association is at its per-association
/// running-jobs limit.
pub const DEP_ASSOC_MRJ: &str = "ASSOC_MRJ";
/// Dependency name attached when the submission queue is at its
/// `max_running_jobs` limit.
pub const DEP_QUEUE_MRJ: &str = "QUEUE_MRJ";
/// Dependency name attached when admitting the job would exceed the
/// association's `max_nodes`/`max_cores`.
pub const DEP_ASSOC_MRES: &str = "ASSOC_MRES";
/// Dependency name attached when admitting the job would exceed the queue's
/// `max_nodes_per_assoc` for this association.
pub const DEP_QUEUE_MRES: &str = "QUEUE_MRES";

/// `FLUX_JOB_URGENCY_HOLD`: the job is pinned at minimum priority.
pub const URGENCY_HOLD: i64 = 0;
/// `FLUX_JOB_URGENCY_DEFAULT`.
pub const URGENCY_DEFAULT: i64 = 16;
/// `FLUX_JOB_URGENCY_EXPEDITE`: the job is pinned at maximum priority.
pub const URGENCY_EXPEDITE: i64 = 31;

/// `FLUX_JOB_PRIORITY_MIN`. Host-defined; mirrored here as the value Flux
/// itself uses.
pub const PRIORITY_MIN: i64 = 0;
/// `FLUX_JOB_PRIORITY_MAX`.
pub const PRIORITY_MAX: i64 = 4_294_967_295;

/// A bank's per-job priority contribution (spec.md §3, §4.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bank {
    pub name: String,
    pub priority: i64,
}

/// A submission queue's admission policy (spec.md §3). `min_nodes_per_job`,
/// `max_nodes_per_job`, and `max_time_per_job` are carried but unenforced,
/// per SPEC_FULL.md §C.3 -- only `max_running_jobs` and `max_nodes_per_assoc`
/// gate admission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Queue {
    pub name: String,
    pub priority: i64,
    pub max_running_jobs: i64,
    pub max_nodes_per_assoc: i64,
    pub min_nodes_per_job: i64,
    pub max_nodes_per_job: i64,
    pub max_time_per_job: f64,
}

impl Queue {
    /// A queue with every limit set to "unbounded", matching the defaults
    /// in `accounting.hpp` (`std::numeric_limits<int>::max()`).
    #[must_use]
    pub fn unbounded(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            priority: 0,
            max_running_jobs: i64::MAX,
            max_nodes_per_assoc: i64::MAX,
            min_nodes_per_job: 0,
            max_nodes_per_job: i64::MAX,
            max_time_per_job: f64::MAX,
        }
    }
}

/// Per-queue running-job/node counters for one association.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct QueueUsage {
    pub cur_run_jobs: i64,
    pub cur_nodes: i64,
}

/// A job bound to an association, from `job.new` through `job.state.inactive`
/// (spec.md §3, `original_source/src/plugins/job.hpp`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub nnodes: i64,
    pub ncores: i64,
    pub queue: Option<String>,
    /// Ordered so dependencies are added/removed/reported deterministically;
    /// `original_source`'s `std::vector<std::string> deps` preserves
    /// insertion order the same way.
    pub deps: IndexSet<String>,
    pub t_run: Option<f64>,
}

impl Job {
    #[must_use]
    pub fn new(id: JobId) -> Self {
        Self { id, nnodes: 0, ncores: 0, queue: None, deps: IndexSet::new(), t_run: None }
    }

    pub fn add_dep(&mut self, dep: &'static str) {
        self.deps.insert(dep.to_string());
    }

    #[must_use]
    pub fn contains_dep(&self, dep: &str) -> bool {
        self.deps.contains(dep)
    }

    pub fn remove_dep(&mut self, dep: &str) {
        self.deps.shift_remove(dep);
    }
}

/// One `(userid, bank)` pair's full accounting/policy state (spec.md §3),
/// grounded on `original_source/src/plugins/accounting.hpp::Association`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Association {
    pub bank_name: String,
    pub fairshare: f64,
    pub max_run_jobs: i64,
    pub cur_run_jobs: i64,
    pub max_active_jobs: i64,
    pub cur_active_jobs: i64,
    /// Held jobs, insertion order, re-evaluated FIFO on release (spec.md §4.4).
    pub held_jobs: Vec<Job>,
    pub queues: HashSet<String>,
    /// Scratch value set by the last priority computation that consulted
    /// this association's queue; mirrors the source's `queue_factor` field,
    /// which the original likewise treats as transient working state rather
    /// than a persisted policy input.
    pub queue_factor: i64,
    pub active: bool,
    pub projects: Vec<String>,
    pub def_project: String,
    pub max_nodes: i64,
    pub max_cores: i64,
    pub cur_nodes: i64,
    pub cur_cores: i64,
    pub queue_usage: HashMap<String, QueueUsage>,
    /// Per-queue FIFO index into `held_jobs`: the ids of jobs submitted to
    /// that queue which are currently held on a dependency. Populated by
    /// `depend`, drained by `run`/`inactive` (spec.md §3, §4.4).
    pub queue_held_jobs: HashMap<String, Vec<JobId>>,
}

impl Association {
    #[must_use]
    pub fn new(bank_name: impl Into<String>) -> Self {
        Self {
            bank_name: bank_name.into(),
            fairshare: 0.0,
            max_run_jobs: i64::MAX,
            cur_run_jobs: 0,
            max_active_jobs: i64::MAX,
            cur_active_jobs: 0,
            held_jobs: Vec::new(),
            queues: HashSet::new(),
            queue_factor: 0,
            active: true,
            projects: Vec::new(),
            def_project: String::new(),
            max_nodes: 0,
            max_cores: 0,
            cur_nodes: 0,
            cur_cores: 0,
            queue_usage: HashMap::new(),
            queue_held_jobs: HashMap::new(),
        }
    }

    #[must_use]
    pub fn under_max_run_jobs(&self) -> bool {
        self.cur_run_jobs < self.max_run_jobs
    }

    #[must_use]
    pub fn under_queue_max_run_jobs(&self, queue: &str, queues: &HashMap<String, Queue>) -> bool {
        let Some(q) = queues.get(queue) else { return true };
        let cur = self.queue_usage.get(queue).map_or(0, |u| u.cur_run_jobs);
        cur < q.max_running_jobs
    }

    #[must_use]
    pub fn under_max_resources(&self, nnodes: i64, ncores: i64) -> bool {
        if !(self.max_nodes > 0 && self.max_cores > 0) {
            return true;
        }
        self.cur_nodes + nnodes <= self.max_nodes && self.cur_cores + ncores <= self.max_cores
    }

    #[must_use]
    pub fn under_queue_max_resources(&self, nnodes: i64, queue: &str, queues: &HashMap<String, Queue>) -> bool {
        let Some(q) = queues.get(queue) else { return true };
        let cur_nodes = self.queue_usage.get(queue).map_or(0, |u| u.cur_nodes);
        cur_nodes + nnodes <= q.max_nodes_per_assoc
    }
}
