//! Job-lifecycle scenarios ported literally from
//! `original_source/src/plugins/test/dependencies_test03.cpp`, plus the
//! priority-formula worked example of spec.md §4.4.

use assert_matches::assert_matches;
use fairshare_priority::engine::PriorityEngine;
use fairshare_priority::model::{
    Association, Bank, Queue, QueueUsage, DEP_ASSOC_MRJ, DEP_QUEUE_MRJ, URGENCY_DEFAULT,
};
use fairshare_priority::RejectReason;

const USERID: i64 = 50_001;
const BANK: &str = "bank_A";

fn engine_with(max_run_jobs: i64, max_active_jobs: i64, queues: Vec<Queue>) -> PriorityEngine {
    let mut engine = PriorityEngine::new();
    let mut assoc = Association::new(BANK);
    assoc.max_run_jobs = max_run_jobs;
    assoc.max_active_jobs = max_active_jobs;
    assoc.queues = ["bronze", "silver", "gold"].into_iter().map(String::from).collect();

    engine.update(vec![], queues, vec![((USERID, BANK.to_string()), assoc)], vec![]);
    engine
}

fn engine_with_bank_a() -> PriorityEngine {
    engine_with(
        1,
        2,
        vec![
            { let mut q = Queue::unbounded("bronze"); q.max_running_jobs = 3; q },
            { let mut q = Queue::unbounded("silver"); q.max_running_jobs = 2; q },
            { let mut q = Queue::unbounded("gold"); q.max_running_jobs = 1; q },
        ],
    )
}

/// Scenario 1: per-association `max_run_jobs` limit holds a second job with
/// `ASSOC_MRJ`, and releases it once `cur_run_jobs` drops back to zero.
#[test]
fn scenario1_max_run_jobs_per_association() {
    let mut engine = engine_with_bank_a();
    let key = (USERID, BANK.to_string());
    engine.new_job(1, key.clone(), 1, 1, None);
    // job 1 is already running per the scenario's fixture
    engine.run(1, 1000.0).unwrap();
    assert_eq!(engine.association_for(USERID, BANK).unwrap().cur_run_jobs, 1);

    engine.new_job(2, key.clone(), 1, 1, None);
    let deps = engine.depend(2).unwrap();
    assert_eq!(deps, vec![DEP_ASSOC_MRJ]);
    assert_eq!(engine.association_for(USERID, BANK).unwrap().held_jobs.len(), 1);
    assert!(engine.releasable_jobs(&key).is_empty());

    engine.inactive(1).unwrap();
    assert_eq!(engine.association_for(USERID, BANK).unwrap().cur_run_jobs, 0);

    // re-evaluating job 2's dependency now finds it clear of ASSOC_MRJ
    let deps_after = engine.depend(2).unwrap();
    assert!(deps_after.is_empty());
}

/// Scenario 2: a job submitted to a queue at its own `max_running_jobs`
/// limit while the association is also at its `max_run_jobs` limit picks up
/// both `ASSOC_MRJ` and `QUEUE_MRJ`; both clear together once both
/// counters drop.
#[test]
fn scenario2_max_run_jobs_per_association_and_per_queue() {
    let mut engine = engine_with_bank_a();
    let key = (USERID, BANK.to_string());

    engine.new_job(1, key.clone(), 1, 1, Some("gold".to_string()));
    engine.run(1, 1000.0).unwrap();
    assert_eq!(engine.association_for(USERID, BANK).unwrap().cur_run_jobs, 1);
    assert_eq!(
        engine.association_for(USERID, BANK).unwrap().queue_usage.get("gold").unwrap().cur_run_jobs,
        1
    );

    engine.new_job(2, key.clone(), 1, 1, Some("gold".to_string()));
    let mut deps = engine.depend(2).unwrap();
    deps.sort_unstable();
    let mut expected = vec![DEP_ASSOC_MRJ, DEP_QUEUE_MRJ];
    expected.sort_unstable();
    assert_eq!(deps, expected);

    engine.inactive(1).unwrap();
    let deps_after = engine.depend(2).unwrap();
    assert!(deps_after.is_empty());
}

/// Scenario 3: a generous per-association `max_run_jobs` (10) alongside a
/// tight per-queue limit (1) holds the second job on `QUEUE_MRJ` alone.
#[test]
fn scenario3_max_run_jobs_per_queue_only() {
    let mut engine = engine_with(
        10,
        1000,
        vec![{ let mut q = Queue::unbounded("gold"); q.max_running_jobs = 1; q }],
    );
    let key = (USERID, BANK.to_string());

    engine.new_job(1, key.clone(), 1, 1, Some("gold".to_string()));
    engine.run(1, 1000.0).unwrap();

    engine.new_job(2, key.clone(), 1, 1, Some("gold".to_string()));
    let deps = engine.depend(2).unwrap();
    assert_eq!(deps, vec![DEP_QUEUE_MRJ]);
}

/// spec.md §3/§4.4: `depend` appends a held job to its submission queue's
/// `queue_held_jobs` entry, not just to `held_jobs`; `run` drains it again.
#[test]
fn depend_populates_queue_held_jobs_and_run_drains_it() {
    let mut engine = engine_with(
        10,
        1000,
        vec![{ let mut q = Queue::unbounded("gold"); q.max_running_jobs = 1; q }],
    );
    let key = (USERID, BANK.to_string());

    engine.new_job(1, key.clone(), 1, 1, Some("gold".to_string()));
    engine.run(1, 1000.0).unwrap();

    engine.new_job(2, key.clone(), 1, 1, Some("gold".to_string()));
    engine.depend(2).unwrap();
    assert_eq!(engine.queue_held_jobs(&key, "gold"), vec![2]);

    engine.inactive(1).unwrap();
    let deps_after = engine.depend(2).unwrap();
    assert!(deps_after.is_empty());

    // job 2 now runs clear; `run` removes it from the per-queue held index.
    engine.run(2, 2000.0).unwrap();
    assert!(engine.queue_held_jobs(&key, "gold").is_empty());
}

/// spec.md §4.4's worked priority example: urgency 16 (default), fairshare
/// 0.5, Wf 100000, no queue/bank factor, yields priority 50000.
#[test]
fn priority_formula_worked_example() {
    let mut engine = PriorityEngine::new();
    let bank = Bank { name: "bank_A".to_string(), priority: 0 };
    let mut assoc = Association::new("bank_A");
    assoc.fairshare = 0.5;
    engine.update(vec![bank], vec![], vec![((USERID, "bank_A".to_string()), assoc)], vec![]);

    let key = (USERID, "bank_A".to_string());
    engine.new_job(1, key, 1, 1, None);
    let priority = engine.priority(1, URGENCY_DEFAULT).unwrap();
    assert_eq!(priority, 50_000);
}

/// Urgency `HOLD`/`EXPEDITE` short-circuit straight to the host's
/// min/max priority, bypassing the fairshare-derived sum entirely.
#[test]
fn urgency_extremes_short_circuit_priority() {
    use fairshare_priority::model::{PRIORITY_MAX, PRIORITY_MIN, URGENCY_EXPEDITE, URGENCY_HOLD};

    let mut engine = PriorityEngine::new();
    let mut assoc = Association::new("bank_A");
    assoc.fairshare = 0.9;
    engine.update(vec![], vec![], vec![((USERID, "bank_A".to_string()), assoc)], vec![]);
    let key = (USERID, "bank_A".to_string());
    engine.new_job(1, key.clone(), 1, 1, None);

    assert_eq!(engine.priority(1, URGENCY_HOLD).unwrap(), PRIORITY_MIN);
    assert_eq!(engine.priority(1, URGENCY_EXPEDITE).unwrap(), PRIORITY_MAX);
}

#[test]
fn validate_rejects_unknown_association() {
    let engine = PriorityEngine::new();
    let err = engine.validate(1, Some("nobank"), None, None).unwrap_err();
    assert_matches!(err, RejectReason::UnknownAssociation);
}

#[test]
fn validate_rejects_inactive_association() {
    let mut engine = PriorityEngine::new();
    let mut assoc = Association::new(BANK);
    assoc.active = false;
    engine.update(vec![], vec![], vec![((USERID, BANK.to_string()), assoc)], vec![]);
    let err = engine.validate(USERID, Some(BANK), None, None).unwrap_err();
    assert_matches!(err, RejectReason::Inactive);
}

#[test]
fn validate_uses_default_bank_when_none_submitted() {
    let mut engine = PriorityEngine::new();
    let assoc = Association::new(BANK);
    engine.update(
        vec![],
        vec![],
        vec![((USERID, BANK.to_string()), assoc)],
        vec![(USERID, BANK.to_string())],
    );
    let key = engine.validate(USERID, None, None, None).unwrap();
    assert_eq!(key, (USERID, BANK.to_string()));
}

/// `inactive` on the blocking job must itself clear the dependency on any
/// other held job of the same association, without a second `depend` call.
#[test]
fn inactive_auto_releases_held_job_dependency() {
    let mut engine = engine_with_bank_a();
    let key = (USERID, BANK.to_string());

    engine.new_job(1, key.clone(), 1, 1, None);
    engine.run(1, 1000.0).unwrap();

    engine.new_job(2, key.clone(), 1, 1, None);
    let deps = engine.depend(2).unwrap();
    assert_eq!(deps, vec![DEP_ASSOC_MRJ]);
    assert!(engine.releasable_jobs(&key).is_empty());

    let released = engine.inactive(1).unwrap();
    assert_eq!(released, vec![(2, vec![DEP_ASSOC_MRJ])]);
    assert_eq!(engine.releasable_jobs(&key), vec![2]);
}

/// Invariant 5: a held job that never reaches `run` must not perturb the
/// running-job counters when it goes `inactive`, even though its sibling
/// did run and left `cur_run_jobs`/`cur_nodes`/`cur_cores` non-zero. Job A
/// runs; job B is held on `ASSOC_MRJ` and is cancelled without ever
/// running; A's own `inactive` must still fully reverse its counters.
#[test]
fn inactive_on_a_never_run_job_does_not_perturb_a_sibling_that_ran() {
    let mut engine = engine_with_bank_a();
    let key = (USERID, BANK.to_string());

    engine.new_job(1, key.clone(), 3, 6, None); // job A: runs
    engine.run(1, 1000.0).unwrap();
    assert_eq!(engine.association_for(USERID, BANK).unwrap().cur_run_jobs, 1);

    engine.new_job(2, key.clone(), 5, 9, None); // job B: held, never runs
    let deps = engine.depend(2).unwrap();
    assert_eq!(deps, vec![DEP_ASSOC_MRJ]);

    // B is cancelled (host-side) without ever reaching `run`.
    engine.inactive(2).unwrap();
    let assoc = engine.association_for(USERID, BANK).unwrap();
    assert_eq!(assoc.cur_run_jobs, 1, "B never ran: must not touch cur_run_jobs");
    assert_eq!(assoc.cur_nodes, 3, "B never ran: must not touch cur_nodes");
    assert_eq!(assoc.cur_cores, 6, "B never ran: must not touch cur_cores");

    // A's own inactive now fully reverses its own contribution.
    engine.inactive(1).unwrap();
    let assoc = engine.association_for(USERID, BANK).unwrap();
    assert_eq!(assoc.cur_run_jobs, 0);
    assert_eq!(assoc.cur_nodes, 0);
    assert_eq!(assoc.cur_cores, 0);
}

#[test]
fn queue_usage_counter_unused_in_unbounded_queue() {
    let usage = QueueUsage::default();
    assert_eq!(usage.cur_run_jobs, 0);
    assert_eq!(usage.cur_nodes, 0);
}

/// spec.md §6's `query` RPC shape: one entry per userid, nesting every
/// bank association's full field set, held jobs reported as id strings.
#[test]
fn query_snapshot_groups_by_userid_and_reports_held_job_ids() {
    let mut engine = engine_with_bank_a();
    let key = (USERID, BANK.to_string());
    engine.new_job(1, key.clone(), 1, 1, None);
    engine.run(1, 1000.0).unwrap();
    engine.new_job(2, key.clone(), 1, 1, None);
    engine.depend(2).unwrap();

    let snapshot = engine.query_snapshot();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].userid, USERID);
    assert_eq!(snapshot[0].banks.len(), 1);
    let assoc = &snapshot[0].banks[0];
    assert_eq!(assoc.bank, BANK);
    assert_eq!(assoc.cur_run_jobs, 1);
    assert_eq!(assoc.held_jobs, vec!["2".to_string()]);
}
