//! A compute-hours usage accumulator running alongside the priority engine,
//! grounded on `original_source/src/plugins/compute_hours_limits.cpp`. It
//! mirrors the same job-lifecycle events (`new`, `depend`, `run`,
//! `inactive`) but tracks a completely independent set of books: per-job
//! expected usage and per-association current/total usage in compute-hours.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::model::{JobId, UserId};

/// One job's accrual into its association's usage, from `job.state.run`
/// through `job.state.inactive`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct UsageJob {
    pub id: JobId,
    pub t_run: f64,
    pub nnodes: i64,
    /// `nnodes * node-hours-per-job-limit`, or the association's remaining
    /// budget, whichever the original bounds it to; computed once at
    /// `job.state.run` and held fixed until `inactive`.
    pub expected_usage: f64,
}

/// `original_source`'s `Association` in `compute_hours_limits.cpp`: separate
/// from [`crate::model::Association`], with its own identity and only the
/// fields compute-hours tracking needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HoursAssociation {
    pub userid: UserId,
    pub bank: String,
    pub default_bank: String,
    pub current_usage: f64,
    pub total_usage: f64,
    pub jobs: Vec<UsageJob>,
}

impl HoursAssociation {
    #[must_use]
    pub fn new(userid: UserId, bank: impl Into<String>) -> Self {
        Self {
            userid,
            bank: bank.into(),
            default_bank: String::new(),
            current_usage: 0.0,
            total_usage: 0.0,
            jobs: Vec::new(),
        }
    }
}

/// The compute-hours plugin surface: `new`, `depend` (no-op; compute-hours
/// never holds jobs, it only measures), `run`, `inactive`, `clear`, and
/// `query`, each keyed by `(userid, bank)` the same way the priority engine
/// is.
#[derive(Debug, Clone, Default)]
pub struct ComputeHoursEngine {
    associations: HashMap<(UserId, String), HoursAssociation>,
    bindings: HashMap<JobId, (UserId, String)>,
}

impl ComputeHoursEngine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(&mut self, associations: Vec<HoursAssociation>) {
        self.associations = associations.into_iter().map(|a| ((a.userid, a.bank.clone()), a)).collect();
    }

    /// `job.new`: bind the job so `run`/`inactive` can find its association.
    pub fn new_job(&mut self, id: JobId, userid: UserId, bank: String) {
        self.bindings.insert(id, (userid, bank));
    }

    /// `job.state.run`: the job starts accruing usage at `t_run`, charged at
    /// `inactive` against `current_usage`/`total_usage`.
    pub fn run(&mut self, id: JobId, t_run: f64, nnodes: i64, expected_usage: f64) {
        let Some(key) = self.bindings.get(&id).cloned() else { return };
        let Some(assoc) = self.associations.get_mut(&key) else { return };
        assoc.jobs.push(UsageJob { id, t_run, nnodes, expected_usage });
        assoc.current_usage += expected_usage;
    }

    /// `job.state.inactive`: the job's actual usage (`t_inactive - t_run`
    /// scaled by node count) replaces its `expected_usage` reservation in
    /// `current_usage`, and is folded permanently into `total_usage`.
    pub fn inactive(&mut self, id: JobId, actual_usage: f64) {
        let Some(key) = self.bindings.remove(&id) else { return };
        let Some(assoc) = self.associations.get_mut(&key) else { return };
        if let Some(pos) = assoc.jobs.iter().position(|j| j.id == id) {
            let job = assoc.jobs.remove(pos);
            assoc.current_usage -= job.expected_usage;
        }
        assoc.total_usage += actual_usage;
    }

    /// `rpc.clear`: reset every association's `total_usage` to zero
    /// (spec.md §4.5). `current_usage` and live jobs are untouched -- a
    /// job still running keeps accruing against its association exactly
    /// as it did before the clear.
    pub fn clear(&mut self) {
        for assoc in self.associations.values_mut() {
            assoc.total_usage = 0.0;
        }
    }

    /// `rpc.query`'s `accounting_data` snapshot: every association's usage
    /// totals, independent of the priority engine's own `query` output.
    #[must_use]
    pub fn snapshot(&self) -> Vec<HoursAssociation> {
        self.associations.values().cloned().collect()
    }

    /// Invariant 8: the sum of `expected_usage` across an association's
    /// currently-running jobs equals its `current_usage`.
    #[must_use]
    pub fn current_usage_matches_running_jobs(&self, key: &(UserId, String)) -> bool {
        let Some(assoc) = self.associations.get(key) else { return true };
        let sum: f64 = assoc.jobs.iter().map(|j| j.expected_usage).sum();
        (sum - assoc.current_usage).abs() < 1e-9
    }
}
