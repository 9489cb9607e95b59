//! Exponential backoff for flaky network calls.

use anyhow::{Context, Result};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

const MAX_BACKOFF_MS: u64 = 10_000;

/// Run `f` until it succeeds or `max_retries` retries have failed.
///
/// The delay starts at `initial_backoff_ms` and doubles, capped at 10s.
pub async fn retry_with_backoff<F, Fut, T>(label: &str, max_retries: usize, initial_backoff_ms: u64, f: F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    let mut backoff = initial_backoff_ms;

    loop {
        match f().await {
            Ok(result) => return Ok(result),
            Err(e) if attempt >= max_retries => {
                return Err(e).with_context(|| format!("{}: max retries exceeded", label));
            }
            Err(e) => {
                warn!("{} failed (attempt {}): {}", label, attempt + 1, e);
                tokio::time::sleep(Duration::from_millis(backoff)).await;
                backoff = backoff.saturating_mul(2).min(MAX_BACKOFF_MS);
                attempt += 1;
            }
        }
    }
}
