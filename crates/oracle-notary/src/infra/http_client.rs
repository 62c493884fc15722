//! Retrying `reqwest` wrapper used by C3 (target fetch) and C4 (exchange
//! fan-out): a capped read, a fixed per-request timeout, and bounded retry
//! attempts.

use std::time::Duration;

use crate::domain::request::{AttestationRequest, RequestMethod};

/// Per-request timeout, covering connect through final byte.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const BACKOFF_FLOOR: Duration = Duration::from_secs(2);
const BACKOFF_CEILING: Duration = Duration::from_secs(3);

#[derive(Debug, thiserror::Error)]
pub enum HttpClientError {
    #[error("request to target failed: {reason}")]
    Request { reason: String, status: Option<u16> },
    #[error("response body exceeds the {cap} byte cap")]
    BodyTooLarge { cap: usize },
}

impl HttpClientError {
    /// The upstream HTTP status code, when one was received. `None` for a
    /// pure transport failure (no response ever arrived to carry a status).
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            HttpClientError::Request { status, .. } => *status,
            HttpClientError::BodyTooLarge { .. } => None,
        }
    }
}

fn client_with_defaults() -> reqwest::ClientBuilder {
    reqwest::Client::builder().timeout(REQUEST_TIMEOUT)
}

/// Build a real `reqwest::Client` sharing the defaults this module assumes
/// (10s timeout). Constructed once at startup and threaded through
/// `RuntimeContext`.
pub fn build_client() -> reqwest::Client {
    client_with_defaults()
        .build()
        .expect("static reqwest client configuration is always valid")
}

/// `floor * 2^attempt`, clamped to `[floor, ceiling]` so a long retry chain
/// still backs off rather than growing unbounded.
fn backoff_for_attempt(attempt: u32) -> Duration {
    BACKOFF_FLOOR
        .saturating_mul(1u32 << attempt.min(4))
        .clamp(BACKOFF_FLOOR, BACKOFF_CEILING)
}

/// Fetch `req`'s target, forwarding its method, declared content type, body,
/// and (already-masked, by the time C3 runs) headers. Retries up to 3
/// attempts total with a 2-3s backoff between them. Returns the body and the
/// upstream status code.
pub async fn fetch(
    client: &reqwest::Client,
    req: &AttestationRequest,
    body_cap: usize,
) -> Result<(String, u64), HttpClientError> {
    let url = format!("https://{}", req.url);
    request_with_retry(
        client,
        &url,
        req.request_method,
        req.request_body.as_deref(),
        req.request_content_type.as_deref(),
        &req.request_headers,
        3,
        body_cap,
    )
    .await
}

/// A single-purpose GET used by the price aggregator: `max_attempts`
/// exchange fetches, no request body, capped the same way as C3's fetch.
pub async fn get_retrying(
    client: &reqwest::Client,
    url: &str,
    max_attempts: u32,
) -> Result<String, HttpClientError> {
    let (body, _status) = request_with_retry(
        client,
        url,
        RequestMethod::Get,
        None,
        None,
        &indexmap::IndexMap::new(),
        max_attempts,
        1024 * 1024,
    )
    .await?;
    Ok(body)
}

#[allow(clippy::too_many_arguments)]
async fn request_with_retry(
    client: &reqwest::Client,
    url: &str,
    method: RequestMethod,
    body: Option<&str>,
    content_type: Option<&str>,
    headers: &indexmap::IndexMap<String, String>,
    max_attempts: u32,
    body_cap: usize,
) -> Result<(String, u64), HttpClientError> {
    let mut last_err = None;
    for attempt in 0..max_attempts.max(1) {
        if attempt > 0 {
            tokio::time::sleep(backoff_for_attempt(attempt)).await;
        }
        match try_once(client, url, method, body, content_type, headers, body_cap).await {
            Ok(outcome) => return Ok(outcome),
            Err(err) => last_err = Some(err),
        }
    }
    Err(last_err.expect("loop runs at least once"))
}

async fn try_once(
    client: &reqwest::Client,
    url: &str,
    method: RequestMethod,
    body: Option<&str>,
    content_type: Option<&str>,
    headers: &indexmap::IndexMap<String, String>,
    body_cap: usize,
) -> Result<(String, u64), HttpClientError> {
    let mut builder = match method {
        RequestMethod::Get => client.get(url),
        RequestMethod::Post => client.post(url),
    };
    if let Some(content_type) = content_type {
        builder = builder.header(reqwest::header::CONTENT_TYPE, content_type);
    }
    for (name, value) in headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    if let Some(body) = body {
        builder = builder.body(body.to_string());
    }

    let mut response = builder.send().await.map_err(|err| HttpClientError::Request {
        reason: err.to_string(),
        status: err.status().map(|s| s.as_u16()),
    })?;
    let status = response.status();
    let status_code = status.as_u16();

    if let Some(len) = response.content_length() {
        if len as usize > body_cap {
            return Err(HttpClientError::BodyTooLarge { cap: body_cap });
        }
    }

    // Read chunk by chunk rather than `response.text()`, so a target that
    // lies about (or omits) Content-Length, or drips bytes over a chunked
    // transfer-encoding, still gets cut off at `body_cap` instead of being
    // buffered into memory in full first.
    let mut buf = Vec::new();
    while let Some(chunk) = response.chunk().await.map_err(|err| HttpClientError::Request {
        reason: err.to_string(),
        status: Some(status_code),
    })? {
        if buf.len() + chunk.len() > body_cap {
            return Err(HttpClientError::BodyTooLarge { cap: body_cap });
        }
        buf.extend_from_slice(&chunk);
    }
    let text = String::from_utf8_lossy(&buf).into_owned();

    // A non-2xx upstream status is itself a notarizable fact rather than a
    // client error here; only transport-level failures (connection refused,
    // timeout, TLS) are retried/surfaced as `HttpClientError::Request`.
    Ok((text, status_code as u64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_stays_within_bounds() {
        for attempt in 0..5 {
            let backoff = backoff_for_attempt(attempt);
            assert!(backoff >= BACKOFF_FLOOR);
            assert!(backoff <= BACKOFF_CEILING);
        }
    }
}
