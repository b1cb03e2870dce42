//! The job-priority plugin state machine: `job.validate`, `job.new`,
//! `job.state.depend`, `job.priority`, `job.state.run`, `job.state.inactive`,
//! and the `update`/`reprioritize` RPC handlers (spec.md §4.4), grounded on
//! `original_source/src/plugins/mf_priority.cpp` and `job.cpp`.

use std::collections::HashMap;

use indexmap::IndexMap;
use tracing::{debug, info, warn};

use crate::error::{PriorityError, RejectReason};
use crate::model::{
    Association, Bank, Job, JobId, Queue, UserId, DEP_ASSOC_MRES, DEP_ASSOC_MRJ, DEP_QUEUE_MRES,
    DEP_QUEUE_MRJ, PRIORITY_MAX, PRIORITY_MIN, URGENCY_DEFAULT, URGENCY_EXPEDITE, URGENCY_HOLD,
};

/// `Wf`/`Wq`/`Wb` of spec.md §4.4's priority formula.
#[derive(Debug, Clone, Copy)]
pub struct PriorityWeights {
    pub fairshare: f64,
    pub queue: f64,
    pub bank: f64,
}

impl Default for PriorityWeights {
    fn default() -> Self {
        Self { fairshare: 100_000.0, queue: 1.0, bank: 1.0 }
    }
}

/// `(userid, bank)` key shared by the association table and dispatch calls.
pub type AssocKey = (UserId, String);

/// The plugin's full in-memory state: banks, queues, and associations, plus
/// the bookkeeping needed to answer `job.validate`/`priority`/lifecycle
/// calls without consulting the database again.
#[derive(Debug, Clone)]
pub struct PriorityEngine {
    pub weights: PriorityWeights,
    /// Set by the first `update` RPC. Before that, every association
    /// lookup is a placeholder (SPEC_FULL.md §C.6,
    /// `accounting.cpp::check_map_for_dne_only`) rather than an error, so a
    /// `query` against a not-yet-loaded plugin can be distinguished from a
    /// legitimately empty accounting database.
    loaded: bool,
    banks: HashMap<String, Bank>,
    queues: HashMap<String, Queue>,
    associations: IndexMap<AssocKey, Association>,
    /// `default_bank` table from spec.md §3: a userid's bank when a job
    /// submits with no explicit bank, from
    /// `original_source/src/plugins/bank_info.hpp`.
    default_bank: HashMap<UserId, String>,
    /// `job_id -> (userid, bank)` binding made at `job.new`, consulted by
    /// every later lifecycle call (spec.md §4.4's "association pointer").
    bindings: HashMap<JobId, AssocKey>,
    /// Per-job nnodes/ncores/queue captured at `job.new`, needed to reverse
    /// the resource counters at `job.state.inactive`.
    jobs: HashMap<JobId, Job>,
}

impl Default for PriorityEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl PriorityEngine {
    #[must_use]
    pub fn new() -> Self {
        Self {
            weights: PriorityWeights::default(),
            loaded: false,
            banks: HashMap::new(),
            queues: HashMap::new(),
            associations: IndexMap::new(),
            default_bank: HashMap::new(),
            bindings: HashMap::new(),
            jobs: HashMap::new(),
        }
    }

    /// `rpc.update`: (re)load the full bank/queue/association tables,
    /// replacing whatever was there before (spec.md §4.4). Unlike
    /// `update_fairshare_only`, this call replaces every field, not just
    /// `fairshare`, per SPEC_FULL.md §C.2.
    pub fn update(
        &mut self,
        banks: Vec<Bank>,
        queues: Vec<Queue>,
        associations: Vec<((UserId, String), Association)>,
        default_banks: Vec<(UserId, String)>,
    ) {
        self.banks = banks.into_iter().map(|b| (b.name.clone(), b)).collect();
        self.queues = queues.into_iter().map(|q| (q.name.clone(), q)).collect();
        self.associations = associations.into_iter().collect();
        self.default_bank = default_banks.into_iter().collect();
        self.loaded = true;
        info!(
            banks = self.banks.len(),
            queues = self.queues.len(),
            associations = self.associations.len(),
            "priority tables reloaded"
        );
    }

    /// `rpc.reprioritize`/`update_fairshare_only` (SPEC_FULL.md §C.2): update
    /// only the `fairshare` field of each named association, leaving every
    /// other field -- including held jobs and counters -- untouched.
    pub fn update_fairshare_only(&mut self, fairshares: Vec<((UserId, String), f64)>) {
        for (key, fairshare) in fairshares {
            if let Some(assoc) = self.associations.get_mut(&key) {
                assoc.fairshare = fairshare;
            } else {
                warn!(userid = key.0, bank = %key.1, "reprioritize: unknown association, ignored");
            }
        }
    }

    fn resolve_bank(&self, userid: UserId, bank: Option<&str>) -> Option<String> {
        match bank {
            Some(b) => Some(b.to_string()),
            None => self.default_bank.get(&userid).cloned(),
        }
    }

    fn association(&self, key: &AssocKey) -> Option<&Association> {
        self.associations.get(key)
    }

    fn association_mut(&mut self, key: &AssocKey) -> Option<&mut Association> {
        self.associations.get_mut(key)
    }

    /// `job.validate`: admission control (spec.md §4.4). Returns the
    /// resolved `(userid, bank)` key on acceptance, or the first
    /// [`RejectReason`] encountered.
    pub fn validate(
        &self,
        userid: UserId,
        bank: Option<&str>,
        queue: Option<&str>,
        project: Option<&str>,
    ) -> Result<AssocKey, RejectReason> {
        let Some(bank_name) = self.resolve_bank(userid, bank) else {
            return Err(RejectReason::UnknownAssociation);
        };
        let key = (userid, bank_name);
        let Some(assoc) = self.association(&key) else {
            return Err(RejectReason::UnknownAssociation);
        };
        if !assoc.active {
            return Err(RejectReason::Inactive);
        }
        if assoc.cur_active_jobs >= assoc.max_active_jobs {
            return Err(RejectReason::MaxActiveJobsExceeded);
        }
        if let Some(q) = queue {
            if !self.queues.contains_key(q) {
                return Err(RejectReason::UnknownQueue);
            }
            if !assoc.queues.is_empty() && !assoc.queues.contains(q) {
                return Err(RejectReason::InvalidQueue);
            }
        }
        if let Some(p) = project.filter(|p| !p.is_empty()) {
            if p != assoc.def_project && !assoc.projects.contains(&p.to_string()) {
                if assoc.projects.is_empty() && assoc.def_project.is_empty() {
                    return Err(RejectReason::UnknownProject);
                }
                return Err(RejectReason::InvalidProject);
            }
        }
        Ok(key)
    }

    /// `job.new`: bind the job id to its association and record its resource
    /// request, ahead of any `depend`/`priority`/`run` calls for it.
    pub fn new_job(&mut self, id: JobId, key: AssocKey, nnodes: i64, ncores: i64, queue: Option<String>) {
        let mut job = Job::new(id);
        job.nnodes = nnodes;
        job.ncores = ncores;
        job.queue = queue;
        self.jobs.insert(id, job);
        self.bindings.insert(id, key.clone());
        if let Some(assoc) = self.association_mut(&key) {
            assoc.cur_active_jobs += 1;
        }
    }

    fn binding(&self, id: JobId) -> Result<AssocKey, PriorityError> {
        self.bindings.get(&id).cloned().ok_or(PriorityError::MissingBinding(id))
    }

    /// The dependency-taxonomy strings of spec.md §4.4 currently true for a
    /// job of `(nnodes, ncores)` submitted to `queue` against `assoc`. Shared
    /// by `depend` (evaluated against the job's own request) and the
    /// release pass in `inactive` (re-evaluated against each held job).
    fn violated_deps(
        assoc: &Association,
        nnodes: i64,
        ncores: i64,
        queue: Option<&str>,
        queues: &HashMap<String, Queue>,
    ) -> Vec<&'static str> {
        let mut deps = Vec::new();
        if !assoc.under_max_run_jobs() {
            deps.push(DEP_ASSOC_MRJ);
        }
        if !assoc.under_max_resources(nnodes, ncores) {
            deps.push(DEP_ASSOC_MRES);
        }
        if let Some(q) = queue {
            if !assoc.under_queue_max_run_jobs(q, queues) {
                deps.push(DEP_QUEUE_MRJ);
            }
            if !assoc.under_queue_max_resources(nnodes, q, queues) {
                deps.push(DEP_QUEUE_MRES);
            }
        }
        deps
    }

    /// `job.state.depend`: attach any dependency-taxonomy strings that are
    /// currently true for this job, and enqueue it on the association's
    /// `held_jobs` -- and, if it was submitted to a queue, on that queue's
    /// `queue_held_jobs` entry too -- if at least one applies (spec.md
    /// §4.4, §3).
    pub fn depend(&mut self, id: JobId) -> Result<Vec<&'static str>, PriorityError> {
        let key = self.binding(id)?;
        let job = self.jobs.get(&id).cloned().ok_or(PriorityError::MissingBinding(id))?;
        let queues = self.queues.clone();
        let assoc = self.association_mut(&key).ok_or_else(|| PriorityError::UnknownAssociation(key.0, key.1.clone()))?;

        let deps = Self::violated_deps(assoc, job.nnodes, job.ncores, job.queue.as_deref(), &queues);

        if !deps.is_empty() {
            let mut held = job.clone();
            for d in deps.iter().copied() {
                held.add_dep(d);
            }
            assoc.held_jobs.push(held);
            if let Some(q) = &job.queue {
                assoc.queue_held_jobs.entry(q.clone()).or_default().push(id);
            }
            debug!(job = id, deps = ?deps, "job held on dependency");
        }
        Ok(deps)
    }

    /// Jobs currently held (any outstanding dependency) whose submission
    /// queue was `queue`, in FIFO order -- the `queue_held_jobs` index of
    /// spec.md §3, kept in sync by `depend`/`run`/`inactive`.
    #[must_use]
    pub fn queue_held_jobs(&self, key: &AssocKey, queue: &str) -> Vec<JobId> {
        self.association(key)
            .and_then(|a| a.queue_held_jobs.get(queue))
            .cloned()
            .unwrap_or_default()
    }

    /// Re-evaluate every held job of `key`, in FIFO (insertion) order,
    /// removing any dependency whose predicate no longer holds. Returns
    /// `(job id, deps removed)` pairs for jobs that changed, so the caller
    /// can notify the host runtime per spec.md §4.4's release step; a job
    /// whose `deps` becomes empty is fully released but stays in
    /// `held_jobs` until its own `job.state.run`/`inactive` removes it.
    fn release_cleared_dependencies(&mut self, key: &AssocKey) -> Vec<(JobId, Vec<&'static str>)> {
        let queues = self.queues.clone();
        let Some(snapshot) = self.association(key).cloned() else { return Vec::new() };
        let Some(assoc) = self.association_mut(key) else { return Vec::new() };

        let mut released = Vec::new();
        for job in &mut assoc.held_jobs {
            if job.deps.is_empty() {
                continue;
            }
            let still_violated =
                Self::violated_deps(&snapshot, job.nnodes, job.ncores, job.queue.as_deref(), &queues);
            let mut cleared = Vec::new();
            for d in [DEP_ASSOC_MRJ, DEP_ASSOC_MRES, DEP_QUEUE_MRJ, DEP_QUEUE_MRES] {
                if job.contains_dep(d) && !still_violated.contains(&d) {
                    job.remove_dep(d);
                    cleared.push(d);
                }
            }
            if !cleared.is_empty() {
                debug!(job = job.id, deps = ?cleared, "dependency cleared on release");
                released.push((job.id, cleared));
            }
        }
        released
    }

    /// `job.priority`: the weighted-sum priority of spec.md §4.4. Urgency
    /// `HOLD`/`EXPEDITE` short-circuit to the host's min/max, matching
    /// `original_source`'s handling ahead of the fairshare/bank/queue sum.
    pub fn priority(&mut self, id: JobId, urgency: i64) -> Result<i64, PriorityError> {
        if urgency == URGENCY_HOLD {
            return Ok(PRIORITY_MIN);
        }
        if urgency == URGENCY_EXPEDITE {
            return Ok(PRIORITY_MAX);
        }
        let key = self.binding(id)?;
        let job = self.jobs.get(&id).cloned();
        let weights = self.weights;
        let queue_factor = job
            .as_ref()
            .and_then(|j| j.queue.as_ref())
            .and_then(|q| self.queues.get(q))
            .map_or(0, |q| q.priority);
        let bank_factor = self.banks.get(&key.1).map_or(0, |b| b.priority);

        let assoc = self.association_mut(&key).ok_or_else(|| PriorityError::UnknownAssociation(key.0, key.1.clone()))?;
        assoc.queue_factor = queue_factor;

        let fairshare_term = weights.fairshare * assoc.fairshare;
        let queue_term = weights.queue * queue_factor as f64;
        let bank_term = weights.bank * bank_factor as f64;
        // urgency shifts the fairshare-derived base up or down around its
        // default (16); `original_source` adds it unscaled, same as here.
        let urgency_term = f64::from((urgency - URGENCY_DEFAULT) as i32);

        let priority = fairshare_term + queue_term + bank_term + urgency_term;
        Ok(priority.round().abs() as i64)
    }

    /// `job.state.run`: the job transitions from held/pending to running.
    /// Records `t_run` (the only record of "this job actually ran", since
    /// `inactive` cannot trust the association's aggregate `cur_run_jobs`
    /// counter to tell this job's history apart from its siblings'),
    /// releases it from `held_jobs` if present, and increments the running
    /// counters (spec.md §4.4).
    pub fn run(&mut self, id: JobId, t_run: f64) -> Result<(), PriorityError> {
        let key = self.binding(id)?;
        {
            let job = self.jobs.get_mut(&id).ok_or(PriorityError::MissingBinding(id))?;
            job.t_run = Some(t_run);
        }
        let job = self.jobs.get(&id).cloned().ok_or(PriorityError::MissingBinding(id))?;
        let assoc = self.association_mut(&key).ok_or_else(|| PriorityError::UnknownAssociation(key.0, key.1.clone()))?;

        assoc.held_jobs.retain(|j| j.id != id);
        if let Some(q) = &job.queue {
            assoc.queue_held_jobs.entry(q.clone()).or_default().retain(|&jid| jid != id);
        }
        assoc.cur_run_jobs += 1;
        assoc.cur_nodes += job.nnodes;
        assoc.cur_cores += job.ncores;
        if let Some(q) = &job.queue {
            let usage = assoc.queue_usage.entry(q.clone()).or_default();
            usage.cur_run_jobs += 1;
            usage.cur_nodes += job.nnodes;
        }
        Ok(())
    }

    /// `job.state.inactive`: terminal state. Reverses every counter `run`
    /// advanced, but only if *this* job itself reached `run` -- `job.t_run`
    /// is the per-job record of that, since the association's aggregate
    /// `cur_run_jobs` counter reflects every running job, not just this
    /// one, and a held sibling going `inactive` without ever running must
    /// not perturb it. Always decrements `cur_active_jobs` and drops the
    /// binding (spec.md §4.4). Then re-evaluates every other held job of
    /// this association, FIFO, clearing any dependency whose predicate no
    /// longer holds and returning `(job id, deps cleared)` pairs for the
    /// caller to relay to the host runtime.
    pub fn inactive(&mut self, id: JobId) -> Result<Vec<(JobId, Vec<&'static str>)>, PriorityError> {
        let key = self.binding(id)?;
        let job = self.jobs.remove(&id).ok_or(PriorityError::MissingBinding(id))?;
        let assoc = self.association_mut(&key).ok_or_else(|| PriorityError::UnknownAssociation(key.0, key.1.clone()))?;

        assoc.held_jobs.retain(|j| j.id != id);
        if let Some(q) = &job.queue {
            if let Some(held) = assoc.queue_held_jobs.get_mut(q) {
                held.retain(|&jid| jid != id);
            }
        }
        if job.t_run.is_some() {
            assoc.cur_run_jobs -= 1;
            assoc.cur_nodes -= job.nnodes;
            assoc.cur_cores -= job.ncores;
            if let Some(q) = &job.queue {
                if let Some(usage) = assoc.queue_usage.get_mut(q) {
                    usage.cur_run_jobs -= 1;
                    usage.cur_nodes -= job.nnodes;
                }
            }
        }
        assoc.cur_active_jobs = assoc.cur_active_jobs.saturating_sub(1);
        self.bindings.remove(&id);
        Ok(self.release_cleared_dependencies(&key))
    }

    /// Jobs currently released from hold (empty `deps`) for `assoc_key`, in
    /// FIFO (insertion) order -- the set `job.state.depend` would re-admit
    /// on the next pass.
    #[must_use]
    pub fn releasable_jobs(&self, key: &AssocKey) -> Vec<JobId> {
        self.association(key)
            .map(|a| a.held_jobs.iter().filter(|j| j.deps.is_empty()).map(|j| j.id).collect())
            .unwrap_or_default()
    }

    /// `rpc.query`'s `mf_priority_map` snapshot (spec.md §6): every
    /// association's full field set, grouped by `userid` then by bank, in
    /// table order.
    #[must_use]
    pub fn query_snapshot(&self) -> Vec<crate::rpc::UserPriorityEntry> {
        let mut by_user: IndexMap<UserId, Vec<crate::rpc::AssociationJson>> = IndexMap::new();
        for ((userid, bank), assoc) in &self.associations {
            let held_jobs = crate::rpc::AssociationJson::job_id_strings(
                &assoc.held_jobs.iter().map(|j| j.id).collect::<Vec<_>>(),
            );
            by_user.entry(*userid).or_default().push(crate::rpc::AssociationJson {
                bank: bank.clone(),
                fairshare: assoc.fairshare,
                max_run_jobs: assoc.max_run_jobs,
                cur_run_jobs: assoc.cur_run_jobs,
                max_active_jobs: assoc.max_active_jobs,
                cur_active_jobs: assoc.cur_active_jobs,
                max_nodes: assoc.max_nodes,
                max_cores: assoc.max_cores,
                cur_nodes: assoc.cur_nodes,
                cur_cores: assoc.cur_cores,
                queues: assoc.queues.iter().cloned().collect(),
                queue_factor: assoc.queue_factor,
                projects: assoc.projects.clone(),
                def_project: assoc.def_project.clone(),
                active: assoc.active,
                held_jobs,
            });
        }
        by_user
            .into_iter()
            .map(|(userid, banks)| crate::rpc::UserPriorityEntry { userid, banks })
            .collect()
    }

    #[must_use]
    pub fn association_for(&self, userid: UserId, bank: &str) -> Option<&Association> {
        self.associations.get(&(userid, bank.to_string()))
    }

    /// `false` until the first `update` RPC arrives; a `query` issued while
    /// this is `false` reports "not yet loaded" rather than an empty table.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }
}

/// A [`PriorityEngine`] guarded for the single logical critical section
/// §5 requires around every mutation, using the teacher's standard
/// concurrency primitive rather than a hand-rolled lock.
#[derive(Debug, Default)]
pub struct SharedEngine(parking_lot::Mutex<PriorityEngine>);

impl SharedEngine {
    #[must_use]
    pub fn new(engine: PriorityEngine) -> Self {
        Self(parking_lot::Mutex::new(engine))
    }

    pub fn with_locked<R>(&self, f: impl FnOnce(&mut PriorityEngine) -> R) -> R {
        f(&mut self.0.lock())
    }
}
