use std::future::Future;

use tracing::warn;

use crate::config::RetryPolicy;

/// Run `call` until it succeeds or the policy's attempts are used up.
///
/// Waits `backoff * attempt` between attempts. With the default policy the call
/// is made exactly once.
pub async fn with_retry<T, E, F, Fut>(policy: RetryPolicy, label: &str, call: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    with_retry_if(policy, label, |_| true, call).await
}

/// Like [`with_retry`], but errors for which `retryable` is false are returned at once.
pub async fn with_retry_if<T, E, P, F, Fut>(
    policy: RetryPolicy,
    label: &str,
    retryable: P,
    mut call: F,
) -> Result<T, E>
where
    P: Fn(&E) -> bool,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match call().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < max_attempts && retryable(&err) => {
                warn!(
                    "{} failed (attempt {}/{}): {}; retrying",
                    label, attempt, max_attempts, err
                );
                tokio::time::sleep(policy.backoff * attempt).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
