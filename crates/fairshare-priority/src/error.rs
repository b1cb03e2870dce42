//! Error and rejection types for the job-priority plugin.

use thiserror::Error;

/// Why `job.validate` rejected a job (spec.md §4.4, §6). Not a Rust error in
/// the exceptional sense -- this is the plugin's ordinary admission-control
/// outcome, returned to the host as a rejection message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// `(userid, bank)` has no entry in the association table.
    UnknownAssociation,
    /// The submitted queue has no row in the queue table.
    UnknownQueue,
    /// The submitted queue exists but isn't in the association's allowed set.
    InvalidQueue,
    /// The submitted (or default) project isn't recognized by the engine.
    UnknownProject,
    /// The project is recognized but not in the association's allowed set.
    InvalidProject,
    /// The association's `active` flag is `0`.
    Inactive,
    /// `cur_active_jobs >= max_active_jobs`.
    MaxActiveJobsExceeded,
}

impl RejectReason {
    /// The exit/error code of spec.md §6. `UnknownAssociation`, `Inactive`,
    /// and `MaxActiveJobsExceeded` have no dedicated code in the source
    /// table and are reported as plain rejections (code `0`).
    #[must_use]
    pub fn code(self) -> i64 {
        match self {
            RejectReason::UnknownQueue | RejectReason::UnknownProject => -6,
            RejectReason::InvalidQueue => -6,
            RejectReason::InvalidProject => -7,
            RejectReason::UnknownAssociation
            | RejectReason::Inactive
            | RejectReason::MaxActiveJobsExceeded => 0,
        }
    }

    #[must_use]
    pub fn message(self) -> &'static str {
        match self {
            RejectReason::UnknownAssociation => "user not found in flux-accounting DB",
            RejectReason::UnknownQueue => "queue unknown to flux-accounting",
            RejectReason::InvalidQueue => "association does not have permission to submit to this queue",
            RejectReason::UnknownProject => "project unknown to flux-accounting",
            RejectReason::InvalidProject => "association does not have permission to submit under this project",
            RejectReason::Inactive => "association is inactive",
            RejectReason::MaxActiveJobsExceeded => "association has reached its max-active-jobs limit",
        }
    }
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

/// Invariant violations and binding failures (spec.md §7's "Invariant
/// violation" class): raised as a host exception on the affected job, never
/// a rejection, since the job was already admitted.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PriorityError {
    /// `job.state.depend`/`run`/`inactive` fired for a job with no binding
    /// created in `job.new` -- the job-local association pointer is missing.
    #[error("job {0} has no association binding (job.new never ran or was dropped)")]
    MissingBinding(i64),

    /// A handler referenced an association key with no table entry.
    #[error("no association for (userid={0}, bank={1:?})")]
    UnknownAssociation(i64, String),
}
