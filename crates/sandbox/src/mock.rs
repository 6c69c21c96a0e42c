//! An in-memory `SandboxDriver` for tests that exercise the pool and runner
//! without a real Docker daemon, in the spirit of the teacher's
//! `MockSandbox`.

#![cfg(any(test, feature = "test-util"))]

use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use judgecore_core::Result;

use crate::driver::{ContainerHandle, ExecOutcome, SandboxDriver, SandboxResources};

/// Records calls and lets tests script failures on demand.
pub struct MockDriver {
    next_id: AtomicU64,
    terminated: Mutex<HashSet<ContainerHandle>>,
    fail_next_reset: std::sync::atomic::AtomicBool,
    fail_next_start: std::sync::atomic::AtomicBool,
}

impl MockDriver {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            terminated: Mutex::new(HashSet::new()),
            fail_next_reset: std::sync::atomic::AtomicBool::new(false),
            fail_next_start: std::sync::atomic::AtomicBool::new(false),
        }
    }

    /// The next `exec` call (used by the pool for reset) fails once.
    pub fn fail_next_reset(&self) {
        self.fail_next_reset.store(true, Ordering::SeqCst);
    }

    pub fn fail_next_start(&self) {
        self.fail_next_start.store(true, Ordering::SeqCst);
    }

    pub fn was_terminated(&self, handle: &ContainerHandle) -> bool {
        self.terminated.lock().unwrap().contains(handle)
    }

    pub fn terminated_count(&self) -> usize {
        self.terminated.lock().unwrap().len()
    }
}

impl Default for MockDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SandboxDriver for MockDriver {
    async fn build_image(&self, _context_dir: &Path) -> Result<bool> {
        Ok(true)
    }

    async fn start_container(
        &self,
        _resources: &SandboxResources,
        _code_dir: &Path,
    ) -> Result<ContainerHandle> {
        if self.fail_next_start.swap(false, Ordering::SeqCst) {
            return Err(judgecore_core::Error::container("mock start failure"));
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        Ok(ContainerHandle(format!("mock-{id}")))
    }

    async fn exec(
        &self,
        _handle: &ContainerHandle,
        _argv: &[&str],
        _stdin: Option<&[u8]>,
        _timeout: Option<Duration>,
    ) -> Result<ExecOutcome> {
        if self.fail_next_reset.swap(false, Ordering::SeqCst) {
            return Ok(ExecOutcome::Completed {
                combined_output: b"permission denied".to_vec(),
                exit_code: 1,
            });
        }
        Ok(ExecOutcome::Completed {
            combined_output: Vec::new(),
            exit_code: 0,
        })
    }

    async fn terminate(&self, handle: &ContainerHandle) {
        self.terminated.lock().unwrap().insert(handle.clone());
    }
}
