//! The sandbox driver: build the image, start/exec/terminate containers.
//!
//! Generalized from `multi_agent_sandbox::engine::DockerSandbox`: the
//! teacher's engine creates a fresh container per logical sandbox with a
//! read-only rootfs and a tmpfs workspace. The judging core instead keeps a
//! small warm set of long-lived containers (see `pool.rs`) with the code
//! directory bind-mounted read/write at `/workspace`, because task
//! directories must persist across `Exec` calls within a container's
//! lifetime and reset is a plain `rm -rf` against that mount rather than
//! container replacement.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use bollard::container::{
    Config as ContainerConfig, CreateContainerOptions, LogOutput, RemoveContainerOptions,
    StopContainerOptions,
};
use bollard::exec::{CreateExecOptions, StartExecResults};
use bollard::image::BuildImageOptions;
use bollard::models::HostConfig;
use bollard::Docker;
use futures::StreamExt;
use tracing::{info, warn};

use judgecore_core::{Error, Result};

/// The Docker/Podman image tag the sandbox is built and run from.
pub const SANDBOX_IMAGE: &str = "judgecore:latest";
/// The Dockerfile name inside the build context, per `spec.md` §4.A.
const SANDBOX_DOCKERFILE: &str = "Sandbox";

/// Opaque identifier for a running sandbox container.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContainerHandle(pub String);

impl std::fmt::Display for ContainerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-container resource limits, taken from the `sandbox` config section.
#[derive(Debug, Clone)]
pub struct SandboxResources {
    /// Memory cap in bytes.
    pub memory: i64,
    /// CPU cores as a fraction (e.g. `0.5`), converted to nano-CPUs.
    pub nano_cpus: f64,
    pub cpu_shares: i64,
}

/// The outcome of an `Exec` call: combined stdout+stderr and the raw exit
/// status, or a marker that the outer deadline elapsed first.
#[derive(Debug, Clone)]
pub enum ExecOutcome {
    /// The command ran to completion (or was killed from inside the
    /// container, e.g. by `timeout`/`ulimit`) before the outer deadline.
    Completed {
        combined_output: Vec<u8>,
        exit_code: i64,
    },
    /// The outer deadline elapsed before the command produced a result.
    DeadlineExceeded,
}

/// The sandbox driver contract: build the image, start/exec/terminate
/// containers. Contains no verdict logic and no knowledge of languages.
#[async_trait]
pub trait SandboxDriver: Send + Sync {
    /// Package `context_dir` as a tar stream and build the sandbox image.
    /// Returns `Ok(false)` (not an error) when the engine reports a build
    /// failure, so callers can treat it as an ordinary bootstrap failure.
    async fn build_image(&self, context_dir: &Path) -> Result<bool>;

    /// Create and start a detached container from the sandbox image with an
    /// idle shell and a TTY, the code directory bind-mounted read/write at
    /// `/workspace`, and all Linux capabilities dropped.
    async fn start_container(
        &self,
        resources: &SandboxResources,
        code_dir: &Path,
    ) -> Result<ContainerHandle>;

    /// Run `argv` inside `handle`, optionally feeding `stdin` and bounding
    /// the call by `timeout`. Does not interpret the exit code.
    async fn exec(
        &self,
        handle: &ContainerHandle,
        argv: &[&str],
        stdin: Option<&[u8]>,
        timeout: Option<Duration>,
    ) -> Result<ExecOutcome>;

    /// Best-effort stop and remove; errors are logged and swallowed.
    async fn terminate(&self, handle: &ContainerHandle);
}

/// Production `SandboxDriver` backed by the Docker Engine API via `bollard`.
pub struct BollardDriver {
    docker: Docker,
}

impl BollardDriver {
    /// Connect to the local Docker daemon using the environment's default
    /// transport (Unix socket on Linux/macOS, named pipe on Windows).
    pub fn connect() -> Result<Self> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| Error::EngineUnreachable(e.to_string()))?;
        Ok(Self { docker })
    }

    /// Build a driver from an existing client, for tests against a fake
    /// Docker daemon.
    pub fn from_client(docker: Docker) -> Self {
        Self { docker }
    }
}

#[async_trait]
impl SandboxDriver for BollardDriver {
    async fn build_image(&self, context_dir: &Path) -> Result<bool> {
        let mut tar_bytes = Vec::new();
        {
            let mut builder = tar::Builder::new(&mut tar_bytes);
            builder
                .append_dir_all(".", context_dir)
                .map_err(|e| Error::container(format!("failed to tar build context: {e}")))?;
            builder
                .finish()
                .map_err(|e| Error::container(format!("failed to finish tar stream: {e}")))?;
        }

        let options = BuildImageOptions {
            dockerfile: SANDBOX_DOCKERFILE,
            t: SANDBOX_IMAGE,
            rm: true,
            ..Default::default()
        };

        info!("sandbox image is being built...");
        let mut stream = self.docker.build_image(options, None, Some(tar_bytes.into()));

        let mut ok = true;
        while let Some(chunk) = stream.next().await {
            match chunk {
                Ok(info) => {
                    if let Some(stream_msg) = info.stream {
                        info!(build_output = %stream_msg.trim_end(), "docker build");
                    }
                    if let Some(err) = info.error {
                        warn!(build_error = %err, "docker build reported an error");
                        ok = false;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "error building sandbox image");
                    ok = false;
                }
            }
        }

        Ok(ok)
    }

    async fn start_container(
        &self,
        resources: &SandboxResources,
        code_dir: &Path,
    ) -> Result<ContainerHandle> {
        let bind = format!("{}:/workspace", code_dir.display());

        let host_config = HostConfig {
            memory: Some(resources.memory),
            nano_cpus: Some((resources.nano_cpus * 1e9) as i64),
            cpu_shares: Some(resources.cpu_shares),
            binds: Some(vec![bind]),
            auto_remove: Some(true),
            cap_drop: Some(vec!["ALL".to_string()]),
            ..Default::default()
        };

        let container_config = ContainerConfig {
            image: Some(SANDBOX_IMAGE.to_string()),
            cmd: Some(vec!["sh".to_string()]),
            tty: Some(true),
            host_config: Some(host_config),
            ..Default::default()
        };

        let response = self
            .docker
            .create_container(None::<CreateContainerOptions<String>>, container_config)
            .await
            .map_err(|e| Error::container(format!("failed to create container: {e}")))?;

        self.docker
            .start_container::<String>(&response.id, None)
            .await
            .map_err(|e| Error::container(format!("failed to start container: {e}")))?;

        info!(container_id = %response.id, "sandbox container started");
        Ok(ContainerHandle(response.id))
    }

    async fn exec(
        &self,
        handle: &ContainerHandle,
        argv: &[&str],
        stdin: Option<&[u8]>,
        timeout: Option<Duration>,
    ) -> Result<ExecOutcome> {
        let exec_options = CreateExecOptions {
            cmd: Some(argv.iter().map(|s| s.to_string()).collect()),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            attach_stdin: Some(stdin.is_some()),
            ..Default::default()
        };

        let exec = self
            .docker
            .create_exec(&handle.0, exec_options)
            .await
            .map_err(|e| Error::container(format!("failed to create exec: {e}")))?;

        let run = async {
            let start_result = self
                .docker
                .start_exec(&exec.id, None)
                .await
                .map_err(|e| Error::container(format!("failed to start exec: {e}")))?;

            let mut combined_output = Vec::new();

            if let StartExecResults::Attached {
                mut output,
                mut input,
            } = start_result
            {
                if let Some(data) = stdin {
                    use tokio::io::AsyncWriteExt;
                    let _ = input.write_all(data).await;
                    let _ = input.shutdown().await;
                }

                while let Some(msg) = output.next().await {
                    match msg {
                        Ok(LogOutput::StdOut { message }) | Ok(LogOutput::StdErr { message }) => {
                            combined_output.extend_from_slice(&message);
                        }
                        Ok(_) => {}
                        Err(e) => {
                            warn!(error = %e, "error streaming exec output");
                            break;
                        }
                    }
                }
            }

            let inspect = self
                .docker
                .inspect_exec(&exec.id)
                .await
                .map_err(|e| Error::container(format!("failed to inspect exec: {e}")))?;

            Ok::<_, Error>((combined_output, inspect.exit_code.unwrap_or(-1)))
        };

        let result = match timeout {
            Some(d) => match tokio::time::timeout(d, run).await {
                Ok(inner) => inner?,
                Err(_) => return Ok(ExecOutcome::DeadlineExceeded),
            },
            None => run.await?,
        };

        Ok(ExecOutcome::Completed {
            combined_output: result.0,
            exit_code: result.1,
        })
    }

    async fn terminate(&self, handle: &ContainerHandle) {
        if let Err(e) = self
            .docker
            .stop_container(&handle.0, Some(StopContainerOptions { t: 5 }))
            .await
        {
            warn!(container_id = %handle.0, error = %e, "error stopping container");
        }

        if let Err(e) = self
            .docker
            .remove_container(
                &handle.0,
                Some(RemoveContainerOptions {
                    force: true,
                    ..Default::default()
                }),
            )
            .await
        {
            warn!(container_id = %handle.0, error = %e, "error removing container");
        }
    }
}
