//! An in-memory `ProblemStore` for tests that exercise the dispatcher
//! pipeline without a MySQL server.

#![cfg(any(test, feature = "test-util"))]

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use judgecore_core::{Error, Problem, Result, TestCase, Verdict};

use crate::ProblemStore;

#[derive(Default)]
struct Records {
    problems: HashMap<i64, (Problem, Vec<TestCase>)>,
    /// `(uid, pid) -> result`, mirroring the single `submit_records` row
    /// the runner cares about.
    submissions: HashMap<(i64, i64), String>,
}

/// Seed with `seed_problem`, then drive it through a `Dispatcher` the same
/// way `judgecore-sandbox`'s `MockDriver` stands in for Docker.
pub struct InMemoryStore {
    records: Mutex<Records>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(Records::default()),
        }
    }

    pub fn seed_problem(&self, problem: Problem, test_cases: Vec<TestCase>) {
        let mut records = self.records.lock().unwrap();
        records.problems.insert(problem.pid, (problem, test_cases));
    }

    /// The verdict last persisted for `(uid, pid)`, if any.
    pub fn result_for(&self, uid: i64, pid: i64) -> Option<String> {
        self.records.lock().unwrap().submissions.get(&(uid, pid)).cloned()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProblemStore for InMemoryStore {
    async fn load_problem(&self, pid: i64) -> Result<Problem> {
        self.records
            .lock()
            .unwrap()
            .problems
            .get(&pid)
            .map(|(problem, _)| problem.clone())
            .ok_or(Error::ProblemNotFound(pid))
    }

    async fn load_test_cases(&self, pid: i64) -> Result<Vec<TestCase>> {
        self.records
            .lock()
            .unwrap()
            .problems
            .get(&pid)
            .map(|(_, cases)| cases.clone())
            .ok_or(Error::ProblemNotFound(pid))
    }

    async fn mark_running(&self, uid: i64, pid: i64) -> Result<()> {
        self.records
            .lock()
            .unwrap()
            .submissions
            .insert((uid, pid), "Running...".to_string());
        Ok(())
    }

    async fn update_verdict(&self, uid: i64, pid: i64, verdict: Verdict) -> Result<()> {
        self.records
            .lock()
            .unwrap()
            .submissions
            .insert((uid, pid), verdict.as_label().to_string());
        Ok(())
    }
}
