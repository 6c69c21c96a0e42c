#![deny(unused)]
//! The submission runner: for one task, stage the source inside an
//! acquired container, dispatch to the correct language toolchain,
//! compile, run each test case under time and memory limits, compare
//! outputs, and produce a verdict.
//!
//! Grounded on `core.go`'s `CompileAndRun`, but taking the `SandboxDriver`
//! by trait object (the way `judgecore_sandbox::pool` already does) rather
//! than baking `docker exec` shell-outs directly into the algorithm — this
//! is the Rust-native improvement over the original that makes the whole
//! pipeline unit-testable against a mock driver, with no Docker daemon and
//! no compile toolchains installed.

pub mod language;

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::warn;

use judgecore_core::{Problem, SubmissionTask, TestCase, Verdict};
use judgecore_sandbox::driver::{ContainerHandle, ExecOutcome, SandboxDriver};

use language::Language;

/// Run one submission to completion and return its verdict. Never returns
/// an `Err` — every failure mode maps onto a verdict from the closed set,
/// per `spec.md` §7 ("User-visible failure is always a verdict").
pub async fn run_submission(
    driver: Arc<dyn SandboxDriver>,
    handle: &ContainerHandle,
    task: &SubmissionTask,
    problem: &Problem,
    test_cases: &[TestCase],
) -> Verdict {
    let task_dir = format!("/workspace/task_{}", now_nanos());

    if !exec_succeeds(&driver, handle, &["mkdir", "-p", &task_dir]).await {
        warn!(task_dir = %task_dir, "failed to create task directory");
        return Verdict::SystemError;
    }

    let source_path = format!("/workspace/{}", task.filename);
    if !exec_succeeds(&driver, handle, &["cp", &source_path, &task_dir]).await {
        warn!(filename = %task.filename, "failed to stage source into task directory");
        cleanup(&driver, handle, &task_dir).await;
        return Verdict::SystemError;
    }

    // Guarantees the task directory is removed on every remaining exit
    // path below, the idiomatic-Rust equivalent of the original's `defer`.
    let _guard = TaskDirGuard {
        driver: driver.clone(),
        handle: handle.clone(),
        task_dir: task_dir.clone(),
    };

    let (time_limit_secs, memory_limit_kb) = match problem.parse_limits() {
        Ok(limits) => limits,
        Err(e) => {
            warn!(error = %e, "failed to parse problem limits");
            return Verdict::SystemError;
        }
    };

    let ext = match task.extension() {
        Some(ext) => ext,
        None => return Verdict::SystemError,
    };
    let language = match Language::from_extension(ext) {
        Some(language) => language,
        None => {
            let err = judgecore_core::Error::UnknownExtension(ext.to_string());
            warn!(error = %err, "unsupported source extension");
            return Verdict::SystemError;
        }
    };
    let stem = &task.filename[..task.filename.len() - ext.len()];

    for step in language.compile_steps(&task_dir, &task.filename, stem) {
        if !exec_succeeds(&driver, handle, &["sh", "-c", &step]).await {
            return Verdict::CompileError;
        }
    }

    let run_command =
        language.run_command(&task_dir, &task.filename, stem, time_limit_secs, memory_limit_kb);
    let outer_deadline = Duration::from_secs(time_limit_secs + 1);

    for test_case in test_cases {
        let outcome = driver
            .exec(
                handle,
                &["sh", "-c", &run_command],
                Some(&test_case.input_data),
                Some(outer_deadline),
            )
            .await;

        match outcome {
            Ok(ExecOutcome::DeadlineExceeded) => return Verdict::TimeLimitExceeded,
            Ok(ExecOutcome::Completed {
                combined_output,
                exit_code,
            }) => match exit_code {
                124 => return Verdict::TimeLimitExceeded,
                137 => return Verdict::MemoryLimitExceeded,
                0 => {
                    if trim(&combined_output) != trim(&test_case.expected_output) {
                        return Verdict::WrongAnswer;
                    }
                }
                _ => return Verdict::RuntimeError,
            },
            Err(e) => {
                warn!(error = %e, "sandbox engine error while running test case");
                return Verdict::SystemError;
            }
        }
    }

    Verdict::Accepted
}

/// Run `argv` with no stdin and no deadline, treating any non-zero exit or
/// engine-level error as failure.
async fn exec_succeeds(driver: &Arc<dyn SandboxDriver>, handle: &ContainerHandle, argv: &[&str]) -> bool {
    matches!(
        driver.exec(handle, argv, None, None).await,
        Ok(ExecOutcome::Completed { exit_code: 0, .. })
    )
}

async fn cleanup(driver: &Arc<dyn SandboxDriver>, handle: &ContainerHandle, task_dir: &str) {
    let _ = driver.exec(handle, &["rm", "-rf", task_dir], None, None).await;
}

/// Removes `task_dir` from the container on drop, regardless of which exit
/// path produced the verdict. The cleanup itself is async, so it is spawned
/// as a detached task rather than awaited inline from `Drop` — the same
/// fire-and-forget shape `ContainerPool::release` already uses for
/// replacement termination.
struct TaskDirGuard {
    driver: Arc<dyn SandboxDriver>,
    handle: ContainerHandle,
    task_dir: String,
}

impl Drop for TaskDirGuard {
    fn drop(&mut self) {
        let driver = self.driver.clone();
        let handle = self.handle.clone();
        let task_dir = self.task_dir.clone();
        tokio::spawn(async move {
            cleanup(&driver, &handle, &task_dir).await;
        });
    }
}

fn now_nanos() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before the Unix epoch")
        .as_nanos()
}

/// Trim ASCII whitespace from both ends only; full-byte equality of the
/// trimmed bodies. No per-line normalization, no trailing-newline
/// tolerance beyond this — `spec.md` §4.C/§9 require matching this
/// exactly for compatibility even though it can reject semantically-equal
/// outputs that differ in intermediate whitespace.
fn trim(data: &[u8]) -> &[u8] {
    let is_space = |b: &u8| b.is_ascii_whitespace();
    let start = data.iter().position(|b| !is_space(b)).unwrap_or(data.len());
    let end = data.iter().rposition(|b| !is_space(b)).map_or(start, |i| i + 1);
    &data[start..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use judgecore_core::{Error, Result};
    use std::collections::VecDeque;
    use std::path::Path;
    use std::sync::Mutex as StdMutex;

    /// A `SandboxDriver` that returns scripted `ExecOutcome`s in order and
    /// records every invoked command, so runner tests can assert both the
    /// resulting verdict and the exact shell fragments sent to the
    /// container.
    struct ScriptedDriver {
        outcomes: StdMutex<VecDeque<Result<ExecOutcome>>>,
        calls: StdMutex<Vec<String>>,
    }

    impl ScriptedDriver {
        fn new(outcomes: Vec<Result<ExecOutcome>>) -> Self {
            Self {
                outcomes: StdMutex::new(outcomes.into()),
                calls: StdMutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    fn ok(exit_code: i64) -> Result<ExecOutcome> {
        Ok(ExecOutcome::Completed {
            combined_output: Vec::new(),
            exit_code,
        })
    }

    fn ok_output(output: &str) -> Result<ExecOutcome> {
        Ok(ExecOutcome::Completed {
            combined_output: output.as_bytes().to_vec(),
            exit_code: 0,
        })
    }

    #[async_trait]
    impl SandboxDriver for ScriptedDriver {
        async fn build_image(&self, _context_dir: &Path) -> Result<bool> {
            Ok(true)
        }

        async fn start_container(
            &self,
            _resources: &judgecore_sandbox::driver::SandboxResources,
            _code_dir: &Path,
        ) -> Result<ContainerHandle> {
            Ok(ContainerHandle("scripted".into()))
        }

        async fn exec(
            &self,
            _handle: &ContainerHandle,
            argv: &[&str],
            _stdin: Option<&[u8]>,
            _timeout: Option<Duration>,
        ) -> Result<ExecOutcome> {
            self.calls.lock().unwrap().push(argv.join(" "));
            self.outcomes
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(Error::internal("no more scripted outcomes")))
        }

        async fn terminate(&self, _handle: &ContainerHandle) {}
    }

    fn problem() -> Problem {
        Problem {
            pid: 1,
            time_limit: "1s".into(),
            memory_limit: "64MB".into(),
        }
    }

    fn handle() -> ContainerHandle {
        ContainerHandle("c1".into())
    }

    #[tokio::test]
    async fn cpp_accepted_runs_every_test_case() {
        let driver = Arc::new(ScriptedDriver::new(vec![
            ok(0),              // mkdir
            ok(0),              // cp
            ok(0),              // g++ compile
            ok_output("3\n"),   // test case 1
            ok_output(" 30 "),  // test case 2
        ]));
        let task = SubmissionTask::parse("3_7.cpp").unwrap();
        let test_cases = vec![
            TestCase {
                input_data: b"1 2\n".to_vec(),
                expected_output: b"3".to_vec(),
            },
            TestCase {
                input_data: b"10 20\n".to_vec(),
                expected_output: b"30".to_vec(),
            },
        ];

        let verdict =
            run_submission(driver.clone(), &handle(), &task, &problem(), &test_cases).await;
        assert_eq!(verdict, Verdict::Accepted);

        let calls = driver.calls();
        assert!(calls[2].contains("g++"));
        assert!(calls[3].contains("ulimit -v 65536"));
    }

    #[tokio::test]
    async fn compile_failure_is_compile_error_and_skips_every_test_case() {
        let driver = Arc::new(ScriptedDriver::new(vec![
            ok(0),   // mkdir
            ok(0),   // cp
            ok(1),   // g++ compile fails
        ]));
        let task = SubmissionTask::parse("3_7.cpp").unwrap();
        let test_cases = vec![TestCase {
            input_data: b"1 2\n".to_vec(),
            expected_output: b"3".to_vec(),
        }];

        let verdict =
            run_submission(driver.clone(), &handle(), &task, &problem(), &test_cases).await;
        assert_eq!(verdict, Verdict::CompileError);
        assert_eq!(driver.calls().len(), 3);
    }

    #[tokio::test]
    async fn wrong_answer_short_circuits_before_the_third_test_case() {
        let driver = Arc::new(ScriptedDriver::new(vec![
            ok(0),             // mkdir
            ok(0),             // cp
            ok_output("4"),    // test case 1 matches
            ok_output("4"),    // test case 2 mismatches expected "5"
        ]));
        let task = SubmissionTask::parse("3_7.py").unwrap();
        let test_cases = vec![
            TestCase {
                input_data: b"".to_vec(),
                expected_output: b"4".to_vec(),
            },
            TestCase {
                input_data: b"".to_vec(),
                expected_output: b"5".to_vec(),
            },
            TestCase {
                input_data: b"".to_vec(),
                expected_output: b"anything".to_vec(),
            },
        ];

        let verdict =
            run_submission(driver.clone(), &handle(), &task, &problem(), &test_cases).await;
        assert_eq!(verdict, Verdict::WrongAnswer);
        // mkdir, cp, test case 1, test case 2 — never test case 3.
        assert_eq!(driver.calls().len(), 4);
    }

    #[tokio::test]
    async fn exit_124_is_time_limit_exceeded() {
        let driver = Arc::new(ScriptedDriver::new(vec![ok(0), ok(0), ok(124)]));
        let task = SubmissionTask::parse("3_7.py").unwrap();
        let test_cases = vec![TestCase {
            input_data: Vec::new(),
            expected_output: Vec::new(),
        }];

        let verdict =
            run_submission(driver, &handle(), &task, &problem(), &test_cases).await;
        assert_eq!(verdict, Verdict::TimeLimitExceeded);
    }

    #[tokio::test]
    async fn exit_137_is_memory_limit_exceeded() {
        let driver = Arc::new(ScriptedDriver::new(vec![ok(0), ok(0), ok(137)]));
        let task = SubmissionTask::parse("3_7.py").unwrap();
        let test_cases = vec![TestCase {
            input_data: Vec::new(),
            expected_output: Vec::new(),
        }];

        let verdict =
            run_submission(driver, &handle(), &task, &problem(), &test_cases).await;
        assert_eq!(verdict, Verdict::MemoryLimitExceeded);
    }

    #[tokio::test]
    async fn outer_deadline_elapsed_is_time_limit_exceeded() {
        let driver = Arc::new(ScriptedDriver::new(vec![
            ok(0),
            ok(0),
            Ok(ExecOutcome::DeadlineExceeded),
        ]));
        let task = SubmissionTask::parse("3_7.py").unwrap();
        let test_cases = vec![TestCase {
            input_data: Vec::new(),
            expected_output: Vec::new(),
        }];

        let verdict =
            run_submission(driver, &handle(), &task, &problem(), &test_cases).await;
        assert_eq!(verdict, Verdict::TimeLimitExceeded);
    }

    #[tokio::test]
    async fn other_nonzero_exit_is_runtime_error() {
        let driver = Arc::new(ScriptedDriver::new(vec![ok(0), ok(0), ok(1)]));
        let task = SubmissionTask::parse("3_7.py").unwrap();
        let test_cases = vec![TestCase {
            input_data: Vec::new(),
            expected_output: Vec::new(),
        }];

        let verdict =
            run_submission(driver, &handle(), &task, &problem(), &test_cases).await;
        assert_eq!(verdict, Verdict::RuntimeError);
    }

    #[tokio::test]
    async fn unknown_extension_is_system_error() {
        let driver = Arc::new(ScriptedDriver::new(vec![ok(0), ok(0)]));
        let task = SubmissionTask::parse("3_7.hs").unwrap();

        let verdict = run_submission(driver, &handle(), &task, &problem(), &[]).await;
        assert_eq!(verdict, Verdict::SystemError);
    }

    #[tokio::test]
    async fn unparseable_limits_are_system_error() {
        let driver = Arc::new(ScriptedDriver::new(vec![ok(0), ok(0)]));
        let task = SubmissionTask::parse("3_7.py").unwrap();
        let bad_problem = Problem {
            pid: 1,
            time_limit: "fast".into(),
            memory_limit: "64MB".into(),
        };

        let verdict = run_submission(driver, &handle(), &task, &bad_problem, &[]).await;
        assert_eq!(verdict, Verdict::SystemError);
    }

    #[tokio::test]
    async fn failed_task_dir_creation_is_system_error() {
        let driver = Arc::new(ScriptedDriver::new(vec![ok(1)]));
        let task = SubmissionTask::parse("3_7.py").unwrap();

        let verdict = run_submission(driver, &handle(), &task, &problem(), &[]).await;
        assert_eq!(verdict, Verdict::SystemError);
    }

    #[tokio::test]
    async fn java_compile_renames_before_javac() {
        let driver = Arc::new(ScriptedDriver::new(vec![
            ok(0), // mkdir
            ok(0), // cp
            ok(0), // mv
            ok(0), // javac
            ok_output("ok"),
        ]));
        let task = SubmissionTask::parse("3_7.java").unwrap();
        let test_cases = vec![TestCase {
            input_data: Vec::new(),
            expected_output: b"ok".to_vec(),
        }];

        let verdict =
            run_submission(driver.clone(), &handle(), &task, &problem(), &test_cases).await;
        assert_eq!(verdict, Verdict::Accepted);

        let calls = driver.calls();
        assert!(calls[2].contains("mv") && calls[2].contains("Main.java"));
        assert!(calls[3].contains("javac"));
        assert!(calls[4].contains("-Xms32m"));
    }

    #[test]
    fn trim_matches_full_byte_equality_after_stripping_both_ends() {
        assert_eq!(trim(b"  hello world  \n"), b"hello world");
        assert_eq!(trim(b"exact"), b"exact");
        assert_eq!(trim(b"   "), b"");
    }
}
