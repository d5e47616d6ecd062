use reqwest::{Client, RequestBuilder, Response, StatusCode};
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

pub fn build_client() -> Client {
    let timeout = std::env::var("HTTP_TIMEOUT_SECS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(15);
    let connect = std::env::var("HTTP_CONNECT_TIMEOUT_SECS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(5);
    Client::builder()
        .timeout(Duration::from_secs(timeout))
        .connect_timeout(Duration::from_secs(connect))
        .build()
        .unwrap_or_else(|_| Client::new())
}

/// Server-error statuses worth a second try on an idempotent GET.
pub const RETRYABLE_STATUSES: &[StatusCode] = &[
    StatusCode::INTERNAL_SERVER_ERROR,
    StatusCode::BAD_GATEWAY,
    StatusCode::SERVICE_UNAVAILABLE,
    StatusCode::GATEWAY_TIMEOUT,
];

/// Bounded retry wrapper for the primary catalog fetch. Completion calls do
/// not go through this: a failed generation is skipped, never replayed.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
    pub retry_on: &'static [StatusCode],
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff: Duration::from_millis(100),
            retry_on: RETRYABLE_STATUSES,
        }
    }
}

impl RetryPolicy {
    pub fn should_retry(&self, status: StatusCode) -> bool {
        self.retry_on.contains(&status)
    }

    /// Exponential: `backoff * 2^(attempt - 1)` for the 1-based attempt count.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(8);
        self.backoff * (1u32 << exponent)
    }
}

/// Sends the request, replaying transport errors and retryable statuses up to
/// `policy.max_attempts` total attempts. The final attempt's outcome is
/// returned as-is; status handling stays with the caller.
pub async fn send_with_retry(
    builder: RequestBuilder,
    policy: &RetryPolicy,
) -> reqwest::Result<Response> {
    let mut attempt = 1u32;
    while attempt < policy.max_attempts {
        let Some(request) = builder.try_clone() else {
            break;
        };
        match request.send().await {
            Ok(response) if policy.should_retry(response.status()) => {
                warn!(
                    target = "calliope.http",
                    status = response.status().as_u16(),
                    attempt,
                    "server error, retrying",
                );
            }
            Ok(response) => return Ok(response),
            Err(err) => {
                warn!(
                    target = "calliope.http",
                    error = %err,
                    attempt,
                    "transport error, retrying",
                );
            }
        }
        sleep(policy.delay_for(attempt)).await;
        attempt += 1;
    }
    builder.send().await
}
