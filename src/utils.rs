use std::future::Future;
use std::time::Duration;

use tracing::warn;

/// Retries an operation using the provided backoff delays.
///
/// The operation runs once, then once more after each delay. `label` only
/// feeds the warning logged between attempts.
///
/// # Errors
/// Returns the final error if all attempts fail.
pub async fn retry_with_backoff<T, F, Fut>(
    label: &str,
    delays: &[u64],
    mut operation: F,
) -> anyhow::Result<T>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    let mut attempt = 0usize;
    loop {
        attempt += 1;
        match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if attempt > delays.len() {
                    return Err(err);
                }
                let delay = delays[attempt - 1];
                warn!("{label} failed (attempt {attempt}), retrying in {delay}s: {err:#}");
                tokio::time::sleep(Duration::from_secs(delay)).await;
            }
        }
    }
}
