use std::time::Duration;

use reqwest::Client;

use crate::config::ClientConfig;
use crate::errors::ApiError;

/// Shared HTTP client for the session. One attempt per request, no retries.
pub fn build_client(cfg: &ClientConfig) -> Result<Client, ApiError> {
    let client = Client::builder()
        .user_agent("basalam-panel/0.1")
        .timeout(Duration::from_millis(cfg.timeout_ms))
        .gzip(true)
        .build()?;
    Ok(client)
}

/// Read the body and turn a non-success status into a display-ready error.
pub async fn read_json(resp: reqwest::Response) -> Result<serde_json::Value, ApiError> {
    let status = resp.status();
    let body = resp.bytes().await?;
    if !status.is_success() {
        return Err(ApiError::HttpStatus {
            status,
            text: String::from_utf8_lossy(&body).into_owned(),
        });
    }
    serde_json::from_slice(&body)
        .map_err(|e| ApiError::Decode(format!("invalid json response: {e}")))
}
