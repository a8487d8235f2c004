//! Bounded retry around external collaborator calls.

use std::future::Future;
use std::time::Duration;

use dayshare_core::error::{DayShareError, Result};

/// Pause between attempts.
const RETRY_BACKOFF: Duration = Duration::from_secs(2);

/// Runs `op` under a per-attempt deadline, retrying up to `max_retries`
/// extra times. Timeouts count as failed attempts. The last error wins.
pub async fn with_retry<T, F, Fut>(
    what: &str,
    max_retries: u32,
    deadline: Duration,
    op: F,
) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut last_err = DayShareError::Timeout(format!("{what} never attempted"));
    for attempt in 0..=max_retries {
        if attempt > 0 {
            tracing::warn!("⏳ {} failed (attempt {}), retrying: {}", what, attempt, last_err);
            tokio::time::sleep(RETRY_BACKOFF).await;
        }
        match tokio::time::timeout(deadline, op()).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(e)) => last_err = e,
            Err(_) => {
                last_err =
                    DayShareError::Timeout(format!("{what} exceeded {}s", deadline.as_secs()));
            }
        }
    }
    Err(last_err)
}
