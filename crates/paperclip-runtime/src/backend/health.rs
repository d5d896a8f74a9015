//! Health checks for llama-server compatible endpoints.

use std::time::Duration;

use anyhow::{Result, anyhow};
use tokio::time::{Instant, sleep};
use tracing::{debug, info};

const POLL_INTERVAL: Duration = Duration::from_millis(500);

fn health_url(base_url: &str) -> String {
    format!("{}/health", base_url.trim_end_matches('/'))
}

fn client() -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(2))
        .build()?)
}

/// Single health probe. `Ok(false)` means the server answered but is not
/// ready (llama-server replies 503 while the model is still loading).
pub async fn check_http_health(base_url: &str) -> Result<bool> {
    let response = client()?.get(health_url(base_url)).send().await?;
    Ok(response.status().is_success())
}

/// Poll `/health` until it returns 200 OK or `timeout` elapses.
pub async fn wait_for_http_health(base_url: &str, timeout: Duration) -> Result<()> {
    let url = health_url(base_url);
    info!(%url, "Waiting for llama-server to be ready");

    let client = client()?;
    let deadline = Instant::now() + timeout;
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        match client.get(&url).send().await {
            Ok(response) if response.status().is_success() => {
                info!(%url, attempt, "llama-server is ready");
                return Ok(());
            }
            Ok(response) => {
                let status = response.status();
                debug!(%status, attempt, "Health check not ready, retrying");
                // Something else owns the port.
                if (status.as_u16() == 403 || status.as_u16() == 404) && attempt > 3 {
                    return Err(anyhow!(
                        "{url} answered {status}; it does not look like llama-server"
                    ));
                }
            }
            Err(e) => debug!(error = %e, attempt, "Health check failed, retrying"),
        }

        if Instant::now() >= deadline {
            return Err(anyhow!(
                "llama-server at {base_url} not ready within {}s",
                timeout.as_secs()
            ));
        }
        sleep(POLL_INTERVAL).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_url_trims_slash() {
        assert_eq!(health_url("http://127.0.0.1:8080/"), "http://127.0.0.1:8080/health");
        assert_eq!(health_url("http://h:1"), "http://h:1/health");
    }

    #[tokio::test]
    async fn test_wait_times_out_on_closed_port() {
        let port = crate::backend::process::allocate_port(39_500, &[]).await.unwrap();
        let result =
            wait_for_http_health(&format!("http://127.0.0.1:{port}"), Duration::from_millis(600))
                .await;
        assert!(result.is_err());
    }
}
