//! Minimal Consul service registry client over `reqwest`.
//!
//! Grounded on `internal/utils/consul.go`'s `RegisterService`: the request
//! body shape (id, name, port, tags, HTTP health check) is reproduced
//! exactly. Deregistration on shutdown is a completeness addition the
//! original never performs.

use judgecore_core::config::ConsulConfig;
use judgecore_core::{Error, Result};

/// A registered service's health-check HTTP target, matching the
/// original's `fmt.Sprintf("%s://%s:%d/api/v1/judgecore/health", ...)`.
fn health_check_url(scheme: &str, address: &str, port: u16) -> String {
    format!("{scheme}://{address}:{port}/api/v1/judgecore/health")
}

/// Register the judging core with Consul.
pub async fn register(
    client: &reqwest::Client,
    consul: &ConsulConfig,
    server_address: &str,
    server_port: u16,
    https: bool,
) -> Result<()> {
    let scheme = if https { "https" } else { "http" };
    let body = serde_json::json!({
        "ID": consul.service_id,
        "Name": consul.service_name,
        "Port": server_port,
        "Tags": ["gin", "judge"],
        "Check": {
            "HTTP": health_check_url(scheme, server_address, server_port),
            "Interval": "60s",
            "Timeout": "6s",
        },
    });

    let url = format!("{}/v1/agent/service/register", consul.address);
    let response = client
        .put(&url)
        .json(&body)
        .send()
        .await
        .map_err(|e| Error::registry(format!("failed to reach Consul: {e}")))?;

    if !response.status().is_success() {
        return Err(Error::registry(format!(
            "Consul rejected service registration: {}",
            response.status()
        )));
    }

    tracing::info!(service = %consul.service_name, id = %consul.service_id, "registered with Consul");
    Ok(())
}

/// Best-effort deregistration; errors are logged, not propagated, since
/// this only runs during shutdown.
pub async fn deregister(client: &reqwest::Client, consul: &ConsulConfig) {
    let url = format!(
        "{}/v1/agent/service/deregister/{}",
        consul.address, consul.service_id
    );
    if let Err(e) = client.delete(&url).send().await {
        tracing::warn!(error = %e, "failed to deregister from Consul");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_check_url_matches_the_original_format() {
        assert_eq!(
            health_check_url("http", "127.0.0.1", 37885),
            "http://127.0.0.1:37885/api/v1/judgecore/health"
        );
    }
}
