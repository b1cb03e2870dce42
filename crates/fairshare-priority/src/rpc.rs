//! JSON-RPC request/response shapes exchanged with the job-priority plugin
//! (spec.md §5), grounded on `original_source/src/plugins/mf_priority.cpp`'s
//! `json_unpack`/`json_pack` call sites.

use serde::{Deserialize, Serialize};

use crate::model::{Bank, JobId, Queue, UserId};

/// `rpc.update` request body: a full replacement of the bank, queue, and
/// association tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateRequest {
    pub banks: Vec<Bank>,
    pub queues: Vec<Queue>,
    pub associations: Vec<AssociationUpdate>,
    #[serde(default)]
    pub default_banks: Vec<DefaultBankEntry>,
}

/// One row of the `update` request's association list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssociationUpdate {
    pub userid: UserId,
    pub bank: String,
    #[serde(default)]
    pub fairshare: f64,
    #[serde(default = "max_i64")]
    pub max_run_jobs: i64,
    #[serde(default = "max_i64")]
    pub max_active_jobs: i64,
    #[serde(default)]
    pub queues: Vec<String>,
    #[serde(default)]
    pub projects: Vec<String>,
    #[serde(default)]
    pub def_project: String,
    #[serde(default)]
    pub max_nodes: i64,
    #[serde(default)]
    pub max_cores: i64,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn max_i64() -> i64 {
    i64::MAX
}

fn default_active() -> bool {
    true
}

/// One row of `update`'s `default_banks` table (SPEC_FULL.md §C.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultBankEntry {
    pub userid: UserId,
    pub bank: String,
}

/// `rpc.reprioritize` request body (`update_fairshare_only`):
/// fairshare-only updates, one entry per association.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReprioritizeRequest {
    pub fairshares: Vec<FairshareEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FairshareEntry {
    pub userid: UserId,
    pub bank: String,
    pub fairshare: f64,
}

/// `rpc.query` response: the priority engine's snapshot alongside the
/// independent compute-hours snapshot (spec.md §6: `{ mf_priority_map:
/// [{userid, banks:[<assoc-json>]}] }`, each assoc-json carrying every
/// field of spec.md §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    pub mf_priority_map: Vec<UserPriorityEntry>,
    pub accounting_data: Vec<AccountingDataEntry>,
}

/// One `userid`'s full set of bank associations, per spec.md §6's
/// `{userid, banks:[...]}` shape (`accounting.cpp::convert_map_to_json`
/// groups by user the same way before nesting each bank's fields).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserPriorityEntry {
    pub userid: UserId,
    pub banks: Vec<AssociationJson>,
}

/// Every field of §3's Association, as emitted by `query`. `held_jobs` is
/// reported as job ids rather than full job records -- the job's own
/// state (nnodes/ncores/deps) is already visible through the host's job
/// listing, only its identity and hold status belong in this snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssociationJson {
    pub bank: String,
    pub fairshare: f64,
    pub max_run_jobs: i64,
    pub cur_run_jobs: i64,
    pub max_active_jobs: i64,
    pub cur_active_jobs: i64,
    pub max_nodes: i64,
    pub max_cores: i64,
    pub cur_nodes: i64,
    pub cur_cores: i64,
    pub queues: Vec<String>,
    pub queue_factor: i64,
    pub projects: Vec<String>,
    pub def_project: String,
    pub active: bool,
    /// Job ids still held on this association, as strings so large job
    /// ids survive JSON round-tripping without precision loss
    /// (SPEC_FULL.md §C.5).
    pub held_jobs: Vec<String>,
}

impl AssociationJson {
    #[must_use]
    pub fn job_id_strings(ids: &[JobId]) -> Vec<String> {
        ids.iter().map(ToString::to_string).collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountingDataEntry {
    pub userid: UserId,
    pub bank: String,
    pub current_usage: f64,
    pub total_usage: f64,
}
