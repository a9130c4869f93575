//! Async utilities and patterns
//!
//! Bounded waits and bounded-concurrency fan-out

use crate::error::{ErrorContext, PulseError, PulseResult};
use futures::stream::{self, StreamExt};
use tokio::time::{timeout, Duration};
use tracing::error;

/// Timeout wrapper for async operations
pub async fn with_timeout<F, T>(future: F, timeout_ms: u64, operation_name: &str) -> PulseResult<T>
where
    F: std::future::Future<Output = T>,
{
    match timeout(Duration::from_millis(timeout_ms), future).await {
        Ok(result) => Ok(result),
        Err(_) => Err(PulseError::Timeout {
            operation: operation_name.to_string(),
            duration_ms: timeout_ms,
            context: ErrorContext::new("async_utils")
                .with_operation("timeout")
                .with_metadata("timeout_ms", &timeout_ms.to_string())
                .with_suggestion("Increase timeout duration")
                .with_suggestion("Check network connectivity"),
        }),
    }
}

/// Aborts the spawned task if the awaiting side goes away first
struct AbortOnDrop(tokio::task::AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Run `processor` over every item on spawned tasks with at most
/// `max_concurrent` in flight.
///
/// Results come back in completion order, each paired with the item that
/// produced it. A task that panics yields an `Internal` error for its item
/// instead of tearing down the whole run. Dropping the returned future aborts
/// every task still in flight.
pub async fn process_concurrently<T, R, F, Fut>(
    items: Vec<T>,
    max_concurrent: usize,
    processor: F,
) -> Vec<(T, PulseResult<R>)>
where
    T: Clone + Send + 'static,
    R: Send + 'static,
    F: Fn(T) -> Fut,
    Fut: std::future::Future<Output = R> + Send + 'static,
{
    stream::iter(items)
        .map(|item| {
            let handle = tokio::spawn(processor(item.clone()));
            let guard = AbortOnDrop(handle.abort_handle());
            async move {
                let _guard = guard;
                let result = handle.await.map_err(|join_error| {
                    error!(error = %join_error, "Concurrent task did not complete");
                    PulseError::Internal {
                        message: format!("Task join error: {}", join_error),
                        source: Some(Box::new(join_error)),
                        context: ErrorContext::new("async_utils")
                            .with_operation("process_concurrently")
                            .with_suggestion("Check for panics in concurrent tasks"),
                    }
                });
                (item, result)
            }
        })
        .buffer_unordered(max_concurrent.max(1))
        .collect()
        .await
}
