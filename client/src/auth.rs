use reqwest::Client;
use serde_json::{json, Value};
use tracing::info;

use crate::config::ClientConfig;
use crate::errors::ApiError;
use crate::http::read_json;

/// Exchange credentials for a bearer token. One attempt; a rejected login
/// carries the server's own message so the screen can show it verbatim.
pub async fn login(
    client: &Client,
    cfg: &ClientConfig,
    username: &str,
    password: &str,
) -> Result<String, ApiError> {
    let url = format!("{}/login", cfg.api_base_url.trim_end_matches('/'));
    let resp = client
        .post(&url)
        .json(&json!({ "username": username, "password": password }))
        .send()
        .await?;
    let body = read_json(resp).await.map_err(auth_flavored)?;

    let status = body.get("status").and_then(Value::as_i64).unwrap_or(0);
    let token = body.get("token").and_then(Value::as_str).unwrap_or("");
    if status != 200 || token.is_empty() {
        return Err(ApiError::Auth(reject_message(&body)));
    }
    info!(target: "auth", "login ok for {}", username);
    Ok(token.to_string())
}

fn reject_message(body: &Value) -> String {
    body.get("message")
        .or_else(|| body.get("error"))
        .and_then(Value::as_str)
        .unwrap_or("login rejected")
        .to_string()
}

fn auth_flavored(err: ApiError) -> ApiError {
    // A failed status on the login endpoint is a credentials problem, not a
    // session problem; keep the server text either way.
    match err {
        ApiError::HttpStatus { text, .. } if !text.is_empty() => ApiError::Auth(text),
        ApiError::HttpStatus { status, .. } => ApiError::Auth(format!("login http {status}")),
        other => other,
    }
}
