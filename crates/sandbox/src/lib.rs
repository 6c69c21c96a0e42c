#![deny(unused)]
//! The sandbox-container pool for the judging core.
//!
//! `driver` talks to the container engine (build/start/exec/terminate, no
//! verdict logic, no language knowledge). `pool` keeps a bounded, warm set
//! of containers started from `driver` and hands them out one task at a
//! time. `mock` is an in-memory `SandboxDriver` for tests that exercise the
//! pool (and, via the `test-util` feature, the runner) without a Docker
//! daemon.

pub mod driver;
pub mod pool;

#[cfg(any(test, feature = "test-util"))]
pub mod mock;

pub use driver::{BollardDriver, ContainerHandle, ExecOutcome, SandboxDriver, SandboxResources};
pub use pool::ContainerPool;

#[cfg(any(test, feature = "test-util"))]
pub use mock::MockDriver;
