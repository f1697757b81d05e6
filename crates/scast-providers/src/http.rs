//! Shared HTTP plumbing for provider clients.

use std::path::Path;
use std::time::{Duration, Instant};

use futures::StreamExt;
use reqwest::header::RETRY_AFTER;
use reqwest::{Client, RequestBuilder, Response};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::{ProviderError, ProviderResult};
use crate::metrics::record_request;

/// Longest error body kept in an error message.
const MAX_ERROR_BODY: usize = 512;

/// Build a client with the given per-request timeout.
pub fn build_client(timeout: Duration) -> ProviderResult<Client> {
    Client::builder()
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(15))
        .pool_idle_timeout(Duration::from_secs(90))
        .user_agent(concat!("scenecast/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(ProviderError::Network)
}

/// Send a request, record metrics, and turn non-2xx responses into errors.
pub async fn send_checked(
    provider: &str,
    operation: &str,
    request: RequestBuilder,
) -> ProviderResult<Response> {
    let started = Instant::now();

    let response = match request.send().await {
        Ok(response) => response,
        Err(e) => {
            record_request(provider, operation, 0, elapsed_ms(started));
            return Err(if e.is_timeout() {
                ProviderError::Timeout(started.elapsed())
            } else {
                ProviderError::Network(e)
            });
        }
    };

    let status = response.status();
    record_request(provider, operation, status.as_u16(), elapsed_ms(started));

    if status.is_success() {
        return Ok(response);
    }

    let retry_after_ms = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(|secs| secs * 1000);

    let body = response.text().await.unwrap_or_default();
    Err(ProviderError::from_http_status(
        status.as_u16(),
        format!("{} {} failed: {}", provider, operation, truncate(&body)),
    )
    .with_retry_after(retry_after_ms))
}

/// Stream a remote file to disk. Returns the number of bytes written.
pub async fn download_to_file(client: &Client, url: &str, path: &Path) -> ProviderResult<u64> {
    let response = send_checked("download", "download", client.get(url)).await?;

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut file = tokio::fs::File::create(path).await?;
    let mut stream = response.bytes_stream();
    let mut written = 0u64;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;

    debug!(url = %url, path = %path.display(), bytes = written, "Downloaded file");
    Ok(written)
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}

fn truncate(body: &str) -> &str {
    match body.char_indices().nth(MAX_ERROR_BODY) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}

/// Read a required environment variable.
pub fn required_env(name: &str) -> ProviderResult<String> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ProviderError::config(format!("{} not set", name)))
}
