#![deny(unused)]
//! The relational store: problems, their test cases, and submission
//! records.
//!
//! Grounded on `internal/utils/db.go` (connection pool setup) and
//! `internal/utils/sql/problems.go` (`SelectProblemByPid`,
//! `SelectTestCasesByPid`, `ModifyJudgeStatus`), reimplemented as a real
//! `sqlx` `MySqlPool` behind the `ProblemStore` trait rather than the
//! GORM query builder the original uses, so the judging core and its
//! tests depend on a narrow trait instead of a concrete database client.

pub mod mysql;

#[cfg(any(test, feature = "test-util"))]
pub mod mock;

use async_trait::async_trait;

use judgecore_core::{Problem, Result, TestCase, Verdict};

pub use mysql::MySqlStore;

#[cfg(any(test, feature = "test-util"))]
pub use mock::InMemoryStore;

/// The judging core's read/write surface onto the relational schema.
/// `problems` and `test_cases` are read-only from here; `submit_records`
/// is written back with the terminal verdict.
#[async_trait]
pub trait ProblemStore: Send + Sync {
    /// Load a problem's limits (and, for the production store, its other
    /// opaque columns — not carried in `Problem`). `Err` when the row is
    /// missing or the query fails.
    async fn load_problem(&self, pid: i64) -> Result<Problem>;

    /// Load a problem's test cases ordered the way the store returns them
    /// (`ORDER BY id`, i.e. insertion order).
    async fn load_test_cases(&self, pid: i64) -> Result<Vec<TestCase>>;

    /// Insert a `submit_records` row in the `Running...` state. Used by
    /// the HTTP front door's upload handler so `update_verdict` always has
    /// a row to find; `spec.md` attributes row creation to the excluded
    /// front door, this just gives that contract a concrete home.
    async fn mark_running(&self, uid: i64, pid: i64) -> Result<()>;

    /// Set the most recent `Running...` row for `(uid, pid)` to the
    /// verdict's label. At-least-once w.r.t. persistence per `spec.md`
    /// Invariant 5 — callers do not retry on failure, they log and move
    /// on (the row is left at `Running...`, which is safe because a
    /// retried update is idempotent against the same predicate).
    async fn update_verdict(&self, uid: i64, pid: i64, verdict: Verdict) -> Result<()>;
}
