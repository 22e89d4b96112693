use std::future::Future;
use std::time::Duration;

use cdp_adapter::AdapterError;
use tokio::time::{sleep, Instant};
use tracing::trace;

/// Poll `probe` every `interval` until it yields a value or `timeout` passes.
///
/// Retriable port errors count as "not yet": the page may be mid-navigation. If the final
/// attempt still failed that way the error is returned instead of `Ok(None)`.
pub(crate) async fn poll_until<T, F, Fut>(
    timeout: Duration,
    interval: Duration,
    mut probe: F,
) -> Result<Option<T>, AdapterError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, AdapterError>>,
{
    let deadline = Instant::now() + timeout;
    let mut attempts = 0u32;
    loop {
        attempts += 1;
        let last_err = match probe().await {
            Ok(Some(value)) => return Ok(Some(value)),
            Ok(None) => None,
            Err(err) if err.retriable => Some(err),
            Err(err) => return Err(err),
        };

        let now = Instant::now();
        if now >= deadline {
            trace!(target: "site-adapters", attempts, "poll deadline reached");
            return match last_err {
                Some(err) => Err(err),
                None => Ok(None),
            };
        }
        sleep(interval.min(deadline - now)).await;
    }
}
