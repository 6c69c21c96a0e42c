//! The bounded warm container pool.
//!
//! Generalizes the teacher's absence of any pooling concept (its
//! `SandboxManager` starts one sandbox per logical task) by following the
//! locking discipline `spec.md` §5 and §9 ("Global container registry")
//! prescribe: a single mutex-protected live set plus a bounded channel
//! standing in for the idle FIFO, so that `ContainerPool` is the single
//! source of truth for live handles instead of a package-level map.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tracing::{info, warn};

use judgecore_core::{Error, Result};

use crate::driver::{ContainerHandle, ExecOutcome, SandboxDriver, SandboxResources};

/// Shell fragment that removes every per-task scratch directory from a
/// container's shared workspace, matching the original `resetContainer`
/// glob exactly.
const RESET_COMMAND: &str =
    "find /workspace -maxdepth 1 -type d -name 'task_*' -exec rm -rf {} +";

struct Inner {
    live: Mutex<HashSet<ContainerHandle>>,
    idle_tx: mpsc::Sender<ContainerHandle>,
    idle_rx: Mutex<mpsc::Receiver<ContainerHandle>>,
    driver: Arc<dyn SandboxDriver>,
    resources: SandboxResources,
    code_dir: PathBuf,
    capacity: usize,
}

/// A bounded, warm set of ready containers. Capacity `N` is fixed at
/// construction and equals the pool's `max_concurrent`.
#[derive(Clone)]
pub struct ContainerPool {
    inner: Arc<Inner>,
}

impl ContainerPool {
    /// Build an (uninitialized) pool of capacity `n` against `driver`,
    /// bind-mounting `code_dir` into every container it starts.
    pub fn new(
        driver: Arc<dyn SandboxDriver>,
        resources: SandboxResources,
        code_dir: impl Into<PathBuf>,
        n: usize,
    ) -> Self {
        let (idle_tx, idle_rx) = mpsc::channel(n.max(1));
        Self {
            inner: Arc::new(Inner {
                live: Mutex::new(HashSet::new()),
                idle_tx,
                idle_rx: Mutex::new(idle_rx),
                driver,
                resources,
                code_dir: code_dir.into(),
                capacity: n,
            }),
        }
    }

    /// Start `n` containers; every successful start is enqueued idle.
    /// Failures are logged and skipped — the pool may come up
    /// under-capacity.
    pub async fn initialize(&self) {
        let mut started = 0;
        for _ in 0..self.inner.capacity {
            match self.start_one().await {
                Ok(handle) => {
                    self.inner.live.lock().await.insert(handle.clone());
                    // Channel has capacity >= n, so this never blocks here.
                    if self.inner.idle_tx.send(handle).await.is_err() {
                        break;
                    }
                    started += 1;
                }
                Err(e) => warn!(error = %e, "error starting container during warm-up"),
            }
        }
        info!(started, capacity = self.inner.capacity, "container pool warmed up");
    }

    async fn start_one(&self) -> Result<ContainerHandle> {
        self.inner
            .driver
            .start_container(&self.inner.resources, &self.inner.code_dir)
            .await
    }

    /// Block until an idle handle is available, FIFO order. Returns
    /// `Err(Error::PoolExhausted)` if the pool has been shut down.
    pub async fn acquire(&self) -> Result<ContainerHandle> {
        let mut rx = self.inner.idle_rx.lock().await;
        rx.recv().await.ok_or(Error::PoolExhausted)
    }

    /// Reset `handle` and return it to the idle set; on reset failure,
    /// terminate it, start a replacement, and enqueue the replacement
    /// instead. If the pool is closed or full, the handle is terminated.
    pub async fn release(&self, handle: ContainerHandle) {
        let reset_ok = self.reset(&handle).await.is_ok();

        let to_enqueue = if reset_ok {
            handle
        } else {
            warn!(container_id = %handle, "reset failed, terminating and replacing");
            {
                let mut live = self.inner.live.lock().await;
                live.remove(&handle);
            }
            let driver = self.inner.driver.clone();
            let dead = handle.clone();
            tokio::spawn(async move {
                driver.terminate(&dead).await;
            });

            match self.start_one().await {
                Ok(replacement) => replacement,
                Err(e) => {
                    warn!(error = %e, "failed to start replacement container");
                    return;
                }
            }
        };

        {
            let mut live = self.inner.live.lock().await;
            live.insert(to_enqueue.clone());
        }

        let rejected = match self.inner.idle_tx.try_send(to_enqueue) {
            Ok(()) => None,
            Err(mpsc::error::TrySendError::Full(h)) => Some(h),
            Err(mpsc::error::TrySendError::Closed(h)) => Some(h),
        };

        if let Some(rejected) = rejected {
            warn!(container_id = %rejected, "pool is full or closed, terminating extra container");
            {
                let mut live = self.inner.live.lock().await;
                live.remove(&rejected);
            }
            let driver = self.inner.driver.clone();
            tokio::spawn(async move {
                driver.terminate(&rejected).await;
            });
        }
    }

    async fn reset(&self, handle: &ContainerHandle) -> Result<()> {
        let outcome = self
            .inner
            .driver
            .exec(handle, &["sh", "-c", RESET_COMMAND], None, None)
            .await?;

        match outcome {
            ExecOutcome::Completed { exit_code, .. } if exit_code == 0 => Ok(()),
            ExecOutcome::Completed { exit_code, .. } => Err(Error::container(format!(
                "reset exited with status {exit_code}"
            ))),
            ExecOutcome::DeadlineExceeded => Err(Error::container("reset timed out")),
        }
    }

    /// Close the idle channel (unblocking every `acquire`) then terminate
    /// every live handle.
    pub async fn shutdown(&self) {
        self.inner.idle_rx.lock().await.close();
        info!("shutting down container pool...");

        let live: Vec<ContainerHandle> = {
            let live = self.inner.live.lock().await;
            live.iter().cloned().collect()
        };
        for handle in live {
            self.inner.driver.terminate(&handle).await;
            info!(container_id = %handle, "terminated container");
        }
        self.inner.live.lock().await.clear();
    }

    /// Number of handles currently tracked as live (idle + in-flight).
    pub async fn live_count(&self) -> usize {
        self.inner.live.lock().await.len()
    }
}
