use anyhow::{Error, anyhow};
use std::future::Future;
use std::time::Duration;
use tracing::debug;

const USER_AGENT: &str = "coinchart/0.1";

/// Builds the HTTP client shared by all providers.
pub fn http_client() -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder().user_agent(USER_AGENT).build()
}

/// Retries a request on transport failures
///
/// # Parameters
/// - `operation`: Closure returning the request future
/// - `retries`: Number of retry attempts (total runs = 1 initial + retries)
/// - `delay_ms`: Milliseconds between attempts
///
/// # Returns
/// Either the response or the last error once attempts are exhausted
pub async fn with_retry<F, Fut, T>(
    mut operation: F,
    retries: usize,
    delay_ms: u64,
) -> Result<T, Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, reqwest::Error>>,
{
    let mut attempt = 1;
    loop {
        match operation().await {
            Ok(val) => return Ok(val),
            Err(err) => {
                if attempt > retries {
                    return Err(anyhow!(err));
                }
                debug!(
                    "Attempt {}/{} failed: {}. Retrying...",
                    attempt, retries, err
                );
                attempt += 1;
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
        }
    }
}

/// Fails with a readable error on non-success HTTP statuses.
pub fn ensure_success(response: &reqwest::Response, what: &str) -> anyhow::Result<()> {
    if !response.status().is_success() {
        return Err(anyhow!("HTTP error: {} for {}", response.status(), what));
    }
    Ok(())
}
