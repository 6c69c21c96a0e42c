#![deny(unused)]
//! JudgeCore — the online-judge submission execution core.
//!
//! Wires together the sandbox image build, the warm container pool, the
//! MySQL store, the broker-fed dispatcher and the HTTP front door, in the
//! order the original `main.go` bootstraps them: directories, logging,
//! configuration, database, Consul client, sandbox image, pool warm-up,
//! dispatcher, HTTP server, service registration, then wait for `exit`/
//! Ctrl+C.

mod config;
mod dispatcher;
mod http;
mod registry;
mod telemetry;

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};

use judgecore_core::config::ServerConfig;
use judgecore_sandbox::{BollardDriver, ContainerPool, SandboxResources};
use judgecore_store::MySqlStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let current_dir = std::env::current_dir()?;
    let dirs = config::Directories::ensure_under(&current_dir)?;

    let _telemetry_guards = telemetry::init(&dirs.logs, std::env::var("RUST_LOG").ok().as_deref())?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting judgecore");

    let app_config = match config::load_or_bootstrap(&dirs.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::error!(error = %e, "failed to load configuration");
            return Ok(());
        }
    };

    let store = match MySqlStore::connect(&app_config.database).await {
        Ok(store) => {
            tracing::info!("MySQL initialization complete");
            Arc::new(store) as Arc<dyn judgecore_store::ProblemStore>
        }
        Err(e) => {
            tracing::error!(error = %e, "database connection failed, please check config/default.toml");
            return Ok(());
        }
    };

    let http_client = reqwest::Client::new();

    tracing::info!("connecting to Consul...");

    let driver: Arc<dyn judgecore_sandbox::SandboxDriver> = match BollardDriver::connect() {
        Ok(driver) => Arc::new(driver),
        Err(e) => {
            tracing::error!(error = %e, "Docker is not reachable");
            return Ok(());
        }
    };

    let sandbox_context_dir = current_dir.join("sandbox");
    let image_built = driver.build_image(&sandbox_context_dir).await.unwrap_or_else(|e| {
        tracing::error!(error = %e, "error building sandbox image");
        false
    });
    if image_built {
        tracing::info!("sandbox image built successfully");
    } else {
        tracing::error!("sandbox image build failed, please make sure Docker is running and up to date");
        return Ok(());
    }

    let resources = SandboxResources {
        memory: app_config.sandbox.memory,
        nano_cpus: app_config.sandbox.nano_cpus,
        cpu_shares: app_config.sandbox.cpu_shares,
    };
    let pool = ContainerPool::new(
        driver.clone(),
        resources,
        dirs.codefiles.clone(),
        app_config.sandbox.max_concurrent,
    );
    pool.initialize().await;

    let dispatcher_ctx = Arc::new(dispatcher::DispatcherContext {
        driver: driver.clone(),
        pool: pool.clone(),
        store: store.clone(),
        broker: judgecore_broker::SharedBroker::new(),
    });
    tokio::spawn(dispatcher::run(
        dispatcher_ctx.clone(),
        app_config.rabbitmq.address.clone(),
        app_config.sandbox.max_concurrent,
    ));

    let http_state = Arc::new(http::HttpState {
        code_dir: dirs.codefiles.clone(),
        store: store.clone(),
    });
    let app = http::router(http_state);
    let bind_address = format!("{}:{}", app_config.server.address, app_config.server.port);
    if let Err(e) = spawn_http_server(app, &bind_address, &app_config.server).await {
        tracing::error!(error = %e, "failed to start HTTP front door");
        return Ok(());
    }

    if let Err(e) = registry::register(
        &http_client,
        &app_config.consul,
        &app_config.server.address,
        app_config.server.port,
        app_config.server.enable_https,
    )
    .await
    {
        tracing::warn!(error = %e, "JudgeCore service registration failed");
    }

    tracing::info!("input 'exit' or Ctrl+C to stop the server");
    wait_for_shutdown_signal().await;

    tracing::info!("the server is shutting down, please be patient to wait for the container to be closed");
    pool.shutdown().await;
    registry::deregister(&http_client, &app_config.consul).await;

    Ok(())
}

/// Starts the HTTP front door, detached, binding plain HTTP or TLS
/// depending on `server.enable_https` — mirrors the original's
/// `startServer` closure choosing between `r.Run` and `r.RunTLS`
/// (`examples/original_source/main.go`). `cert_path`/`key_path` name the
/// PEM files under `certificate/` per `spec.md` §6's filesystem layout.
async fn spawn_http_server(
    app: axum::Router,
    bind_address: &str,
    server: &ServerConfig,
) -> anyhow::Result<()> {
    if server.enable_https {
        let cert_path = server
            .cert_path
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("enable_https is set but server.cert_path is missing"))?;
        let key_path = server
            .key_path
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("enable_https is set but server.key_path is missing"))?;

        let tls_config = axum_server::tls_rustls::RustlsConfig::from_pem_file(cert_path, key_path)
            .await
            .map_err(|e| anyhow::anyhow!("failed to load TLS certificate/key: {e}"))?;
        let addr: std::net::SocketAddr = bind_address.parse()?;

        tracing::info!(address = %bind_address, "HTTP front door listening (TLS enabled)");
        tokio::spawn(async move {
            if let Err(e) = axum_server::bind_rustls(addr, tls_config)
                .serve(app.into_make_service())
                .await
            {
                tracing::error!(error = %e, "HTTPS server exited with an error");
            }
        });
    } else {
        let listener = tokio::net::TcpListener::bind(bind_address).await?;
        tracing::info!(address = %bind_address, "HTTP front door listening");
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!(error = %e, "HTTP server exited with an error");
            }
        });
    }

    Ok(())
}

/// Waits for either Ctrl+C or the literal line `exit`/`EXIT` on stdin,
/// matching the original's quit-channel + stdin-scanner pattern.
async fn wait_for_shutdown_signal() {
    let stdin_watch = async {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if line == "exit" || line == "EXIT" {
                tracing::info!("the server is being shut down, please be patient to wait for the container to be closed");
                return;
            }
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = stdin_watch => {}
    }
}

