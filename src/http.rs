//! Shared HTTP plumbing for the hosted model providers.
//!
//! Each call is a single attempt. Failures are classified so the core retry
//! loop can decide what to do with them:
//! - HTTP 429 (rate limited) and 5xx (server error) → retryable
//! - HTTP 4xx (client error, not 429) → permanent
//! - Network errors → retryable

use anyhow::{Context, Result};
use docgate_core::retry::permanent;
use std::time::Duration;

/// Build the client used by a provider. The per-attempt timeout is applied
/// by the core retry policy, this one only bounds a stuck connection.
pub fn client(timeout_secs: u64) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs.max(1)))
        .build()
        .context("Failed to build HTTP client")
}

/// Read an API key from `var`.
pub fn api_key(var: &str) -> Result<String> {
    std::env::var(var).map_err(|_| anyhow::anyhow!("{} environment variable not set", var))
}

/// POST `body` as JSON and return the decoded JSON response.
pub async fn post_json(
    client: &reqwest::Client,
    label: &str,
    url: &str,
    bearer: Option<&str>,
    body: &serde_json::Value,
) -> Result<serde_json::Value> {
    let mut req = client
        .post(url)
        .header("Content-Type", "application/json")
        .json(body);
    if let Some(key) = bearer {
        req = req.header("Authorization", format!("Bearer {}", key));
    }

    let response = req
        .send()
        .await
        .with_context(|| format!("{} connection error ({})", label, url))?;
    let status = response.status();

    if status.is_success() {
        return response
            .json()
            .await
            .with_context(|| format!("{} returned invalid JSON", label));
    }

    let body_text = response.text().await.unwrap_or_default();
    let err = anyhow::anyhow!("{} API error {}: {}", label, status, body_text);
    if status.as_u16() == 429 || status.is_server_error() {
        Err(err)
    } else {
        Err(permanent(err))
    }
}

/// Join a base URL and a path without doubling slashes.
pub fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
