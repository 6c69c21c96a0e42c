//! Pool-level integration tests against `MockDriver`.
//!
//! These exercise the invariants `spec.md` §8 calls out directly: capacity
//! is never exceeded, concurrent acquires hand out distinct handles, and a
//! reset failure during release triggers replacement rather than reuse.

use std::path::Path;
use std::sync::Arc;

use judgecore_sandbox::{ContainerPool, MockDriver, SandboxResources};

fn resources() -> SandboxResources {
    SandboxResources {
        memory: 512 * 1024 * 1024,
        nano_cpus: 0.5,
        cpu_shares: 1024,
    }
}

#[tokio::test]
async fn concurrent_acquires_never_exceed_capacity_and_hand_out_distinct_handles() {
    let driver = Arc::new(MockDriver::new());
    let pool = ContainerPool::new(driver, resources(), Path::new("/tmp/code"), 3);
    pool.initialize().await;

    let a = pool.acquire().await.unwrap();
    let b = pool.acquire().await.unwrap();
    let c = pool.acquire().await.unwrap();

    assert_ne!(a, b);
    assert_ne!(b, c);
    assert_ne!(a, c);
    assert_eq!(pool.live_count().await, 3);

    pool.release(a).await;
    pool.release(b).await;
    pool.release(c).await;
    assert_eq!(pool.live_count().await, 3);
}

#[tokio::test]
async fn reset_failure_replaces_without_growing_the_pool() {
    let driver = Arc::new(MockDriver::new());
    let pool = ContainerPool::new(driver.clone(), resources(), Path::new("/tmp/code"), 2);
    pool.initialize().await;

    let h1 = pool.acquire().await.unwrap();
    let h2 = pool.acquire().await.unwrap();

    driver.fail_next_reset();
    pool.release(h1.clone()).await;
    pool.release(h2).await;

    // The pool never grows past its configured capacity even though one
    // release replaced its handle with a freshly started container.
    assert_eq!(pool.live_count().await, 2);
    assert!(driver.was_terminated(&h1));
}

#[tokio::test]
async fn shutdown_terminates_every_container_and_unblocks_waiters() {
    let driver = Arc::new(MockDriver::new());
    let pool = ContainerPool::new(driver.clone(), resources(), Path::new("/tmp/code"), 1);
    pool.initialize().await;

    let pool2 = pool.clone();
    let waiter = tokio::spawn(async move {
        // Drain the only container so the next acquire blocks.
        let h = pool2.acquire().await.unwrap();
        drop(h);
        pool2.acquire().await
    });

    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    pool.shutdown().await;

    assert!(waiter.await.unwrap().is_err());
    assert_eq!(driver.terminated_count(), 1);
}
