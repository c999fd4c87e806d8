//! Liveness polling for the forwarder's `/healthz` endpoint

use std::time::Duration;

use tokio::time::Instant;

use crate::error::ControlError;

const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Poll `url` until it answers with a success status or the deadline
/// passes. Connection failures and error statuses are both treated as
/// "not ready yet".
pub async fn wait_for_healthy(url: &str, timeout: Duration) -> Result<(), ControlError> {
    let client = reqwest::Client::builder()
        .timeout(POLL_INTERVAL)
        .build()
        .map_err(|e| ControlError::config(format!("http client: {e}")))?;

    let deadline = Instant::now() + timeout;
    loop {
        match client.get(url).send().await {
            Ok(response) if response.status().is_success() => return Ok(()),
            Ok(_) | Err(_) => {}
        }
        if Instant::now() >= deadline {
            return Err(ControlError::StartupTimeout {
                url: url.to_string(),
                secs: timeout.as_secs(),
            });
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}
