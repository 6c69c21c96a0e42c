//! The task dispatcher: consume `judgeTask`, fan out over `N` workers,
//! run each submission to a verdict, persist it, publish it, and reconnect
//! the broker connection on failure.
//!
//! Grounded on `internal/judge/worker.go`'s `ProcessJudgeTasks`/`worker`:
//! one task channel shared by a fixed worker pool, `strings.Split` task
//! parsing, `ModifyJudgeStatus` then `PublishJudgeResult` then
//! `ReleaseContainer` in that order. The channel is bounded to `N` here
//! (`spec.md` §4.D's recommended option) instead of the original's
//! unbounded Go channel, and reconnection is explicit where the original
//! simply returns and stops on a connect error.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::mpsc;
use tracing::{info, warn};

use judgecore_broker::{BrokerClient, SharedBroker};
use judgecore_core::{ResultMessage, SubmissionTask, Verdict};
use judgecore_sandbox::{ContainerPool, SandboxDriver};
use judgecore_store::ProblemStore;

const RECONNECT_BACKOFF: Duration = Duration::from_secs(3);

/// Everything a worker needs to run one task to completion.
pub struct DispatcherContext {
    pub driver: Arc<dyn SandboxDriver>,
    pub pool: ContainerPool,
    pub store: Arc<dyn ProblemStore>,
    pub broker: SharedBroker,
}

/// Start `n` worker tasks draining a bounded channel, and the consume loop
/// that feeds it, reconnecting the broker on failure. Runs until the
/// process exits; does not return under normal operation.
pub async fn run(ctx: Arc<DispatcherContext>, broker_addr: String, n: usize) {
    let (task_tx, task_rx) = mpsc::channel::<SubmissionTask>(n.max(1));
    let task_rx = Arc::new(tokio::sync::Mutex::new(task_rx));

    for worker_id in 0..n {
        let ctx = ctx.clone();
        let task_rx = task_rx.clone();
        tokio::spawn(async move { worker_loop(worker_id, ctx, task_rx).await });
    }

    loop {
        match BrokerClient::connect(&broker_addr).await {
            Ok(client) => {
                let client = Arc::new(client);
                ctx.broker.set(client.clone()).await;
                info!("dispatcher consuming judgeTask");

                if let Err(e) = consume_until_error(&client, &task_tx).await {
                    warn!(error = %e, "broker consume loop ended, reconnecting");
                }
                ctx.broker.clear().await;
                client.close().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to connect to broker, retrying");
            }
        }
        tokio::time::sleep(RECONNECT_BACKOFF).await;
    }
}

async fn consume_until_error(
    client: &BrokerClient,
    task_tx: &mpsc::Sender<SubmissionTask>,
) -> judgecore_core::Result<()> {
    let mut consumer = client.consume_tasks().await?;

    while let Some(delivery) = consumer.next().await {
        let delivery = match delivery {
            Ok(delivery) => delivery,
            Err(e) => return Err(judgecore_core::Error::broker(format!("delivery error: {e}"))),
        };

        let body = String::from_utf8_lossy(&delivery.data).to_string();
        match SubmissionTask::parse(&body) {
            Ok(task) => {
                if task_tx.send(task).await.is_err() {
                    warn!("worker channel closed, dropping task");
                }
            }
            Err(e) => warn!(body = %body, error = %e, "malformed task body, skipping"),
        }
    }

    Ok(())
}

async fn worker_loop(
    worker_id: usize,
    ctx: Arc<DispatcherContext>,
    task_rx: Arc<tokio::sync::Mutex<mpsc::Receiver<SubmissionTask>>>,
) {
    loop {
        let task = {
            let mut rx = task_rx.lock().await;
            match rx.recv().await {
                Some(task) => task,
                None => return,
            }
        };
        info!(worker_id, user_id = task.user_id, problem_id = task.problem_id, "picked up task");
        run_one(&ctx, &task).await;
    }
}

async fn run_one(ctx: &DispatcherContext, task: &SubmissionTask) {
    let problem = match ctx.store.load_problem(task.problem_id).await {
        Ok(problem) => problem,
        Err(e) => {
            warn!(error = %e, problem_id = task.problem_id, "failed to load problem");
            return;
        }
    };

    let test_cases = match ctx.store.load_test_cases(task.problem_id).await {
        Ok(test_cases) => test_cases,
        Err(e) => {
            warn!(error = %e, problem_id = task.problem_id, "failed to load test cases");
            return;
        }
    };

    if test_cases.is_empty() {
        warn!(problem_id = task.problem_id, "problem has no test cases");
        persist_and_publish(ctx, task, Verdict::SystemError).await;
        return;
    }

    let handle = match ctx.pool.acquire().await {
        Ok(handle) => handle,
        Err(e) => {
            warn!(error = %e, "failed to acquire a sandbox container");
            return;
        }
    };

    let verdict =
        judgecore_runner::run_submission(ctx.driver.clone(), &handle, task, &problem, &test_cases)
            .await;

    persist_and_publish(ctx, task, verdict).await;

    ctx.pool.release(handle).await;
}

/// Persist the verdict (`submit_records`) then publish it (`judgeResults`),
/// logging and continuing on either failure — per `spec.md` §3 Invariant 5,
/// persistence is at-least-once and publication is at-most-once per worker
/// lifetime, never blocking the worker on either failing.
async fn persist_and_publish(ctx: &DispatcherContext, task: &SubmissionTask, verdict: Verdict) {
    if let Err(e) = ctx
        .store
        .update_verdict(task.user_id, task.problem_id, verdict)
        .await
    {
        warn!(error = %e, "failed to persist verdict");
    }

    let message = ResultMessage::new(task.user_id, task.problem_id, verdict);
    if let Err(e) = ctx.broker.publish_result(&message).await {
        warn!(error = %e, "failed to publish verdict");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use judgecore_core::{Problem, TestCase, Verdict};
    use judgecore_sandbox::MockDriver;
    use judgecore_store::InMemoryStore;

    #[tokio::test]
    async fn run_one_persists_a_verdict_without_a_broker_connection() {
        let driver = Arc::new(MockDriver::new());
        let pool = ContainerPool::new(
            driver.clone(),
            judgecore_sandbox::SandboxResources {
                memory: 64 * 1024 * 1024,
                nano_cpus: 0.5,
                cpu_shares: 1024,
            },
            std::env::temp_dir(),
            1,
        );
        pool.initialize().await;

        let store = Arc::new(InMemoryStore::new());
        store.seed_problem(
            Problem {
                pid: 7,
                time_limit: "1s".into(),
                memory_limit: "64MB".into(),
            },
            vec![TestCase {
                input_data: Vec::new(),
                expected_output: Vec::new(),
            }],
        );

        let ctx = DispatcherContext {
            driver,
            pool: pool.clone(),
            store: store.clone(),
            broker: SharedBroker::new(),
        };
        let task = SubmissionTask::parse("3_7.py").unwrap();

        run_one(&ctx, &task).await;

        assert_eq!(store.result_for(3, 7), Some(Verdict::Accepted.as_label().to_string()));
        assert_eq!(pool.live_count().await, 1);
    }

    #[tokio::test]
    async fn run_one_persists_system_error_without_touching_the_pool_when_no_test_cases() {
        let driver = Arc::new(MockDriver::new());
        let pool = ContainerPool::new(
            driver.clone(),
            judgecore_sandbox::SandboxResources {
                memory: 64 * 1024 * 1024,
                nano_cpus: 0.5,
                cpu_shares: 1024,
            },
            std::env::temp_dir(),
            1,
        );
        pool.initialize().await;

        let store = Arc::new(InMemoryStore::new());
        store.seed_problem(
            Problem {
                pid: 8,
                time_limit: "1s".into(),
                memory_limit: "64MB".into(),
            },
            vec![],
        );

        let ctx = DispatcherContext {
            driver,
            pool: pool.clone(),
            store: store.clone(),
            broker: SharedBroker::new(),
        };
        let task = SubmissionTask::parse("3_8.py").unwrap();

        run_one(&ctx, &task).await;

        assert_eq!(
            store.result_for(3, 8),
            Some(Verdict::SystemError.as_label().to_string())
        );
        // No container was ever acquired for this task, so the pool is
        // untouched — still fully idle at capacity 1.
        assert_eq!(pool.live_count().await, 1);
    }
}
