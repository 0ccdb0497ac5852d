//! Shared HTTP send loop with retry for the provider clients

use reqwest::{Client, RequestBuilder, Response};
use std::time::Duration;
use tracing::{debug, warn};

use super::LlmError;

/// Maximum number of retries for transient errors
const MAX_RETRIES: u32 = 3;

/// Initial backoff delay for retries
const INITIAL_BACKOFF_MS: u64 = 1000;

/// Whether a failed attempt should be tried again.
///
/// Rate limits are handed back to the caller rather than slept through.
fn should_retry(error: &LlmError, attempt: u32) -> bool {
    attempt < MAX_RETRIES && error.is_retryable() && !matches!(error, LlmError::RateLimited { .. })
}

/// POST `body` to `url`, retrying transient failures with exponential backoff.
///
/// `decorate` adds provider-specific headers. A 429 is returned immediately
/// as `RateLimited`; other non-success statuses become `ApiError`.
pub(crate) async fn post_json(
    http: &Client,
    url: &str,
    body: &serde_json::Value,
    timeout: Duration,
    decorate: impl Fn(RequestBuilder) -> RequestBuilder,
) -> Result<Response, LlmError> {
    debug!(%url, "post_json: called");
    let mut attempt = 0;
    loop {
        if attempt > 0 {
            let backoff = INITIAL_BACKOFF_MS * 2u64.pow(attempt - 1);
            warn!(attempt, backoff_ms = backoff, "post_json: retrying after transient error");
            tokio::time::sleep(Duration::from_millis(backoff)).await;
        }

        let request = decorate(http.post(url)).header("content-type", "application/json").json(body);
        match send_once(request, timeout).await {
            Ok(response) => {
                debug!("post_json: success");
                return Ok(response);
            }
            Err(e) if should_retry(&e, attempt) => {
                debug!(attempt, error = %e, "post_json: retryable error");
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// One request: classify the transport failure or the non-success status
async fn send_once(request: RequestBuilder, timeout: Duration) -> Result<Response, LlmError> {
    let response = match request.send().await {
        Ok(r) => r,
        Err(e) if e.is_timeout() => return Err(LlmError::Timeout(timeout)),
        Err(e) => return Err(LlmError::Network(e)),
    };

    let status = response.status().as_u16();
    if status == 429 {
        debug!("send_once: rate limited (429)");
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(60);

        return Err(LlmError::RateLimited {
            retry_after: Duration::from_secs(retry_after),
        });
    }

    if !response.status().is_success() {
        debug!(%status, "send_once: API error");
        let text = response.text().await.unwrap_or_default();
        return Err(LlmError::ApiError { status, message: text });
    }

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api_error(status: u16) -> LlmError {
        LlmError::ApiError {
            status,
            message: String::new(),
        }
    }

    #[test]
    fn test_should_retry_transient_errors_until_budget_spent() {
        assert!(should_retry(&api_error(503), 0));
        assert!(should_retry(&api_error(408), 2));
        assert!(should_retry(&LlmError::Timeout(Duration::from_secs(5)), 1));
        assert!(!should_retry(&api_error(503), MAX_RETRIES));
    }

    #[test]
    fn test_should_not_retry_client_errors_or_rate_limits() {
        assert!(!should_retry(&api_error(400), 0));
        assert!(!should_retry(&api_error(401), 0));
        assert!(!should_retry(
            &LlmError::RateLimited {
                retry_after: Duration::from_secs(1)
            },
            0
        ));
        assert!(!should_retry(&LlmError::InvalidResponse("bad".to_string()), 0));
    }
}
