//! Timeout helper for session operations

use std::future::Future;
use std::time::Duration;

use tracing::error;

use crate::error::{CallboxError, CallboxResult};

/// Run `future`, failing with [`CallboxError::Timeout`] after `timeout`
///
/// `None` waits indefinitely.
pub async fn with_timeout<T, F>(
    operation_name: &str,
    timeout: Option<Duration>,
    future: F,
) -> CallboxResult<T>
where
    F: Future<Output = CallboxResult<T>>,
{
    let Some(timeout) = timeout else {
        return future.await;
    };

    match tokio::time::timeout(timeout, future).await {
        Ok(result) => result,
        Err(_) => {
            error!(
                operation = operation_name,
                timeout_ms = timeout.as_millis() as u64,
                "Operation timed out"
            );
            Err(CallboxError::Timeout {
                operation: operation_name.to_string(),
                duration_ms: timeout.as_millis() as u64,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_completes_within_timeout() {
        let value = with_timeout("quick", Some(Duration::from_secs(1)), async { Ok(7) })
            .await
            .unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out() {
        let result: CallboxResult<()> = with_timeout(
            "initialize",
            Some(Duration::from_secs(5)),
            std::future::pending(),
        )
        .await;
        match result {
            Err(CallboxError::Timeout {
                operation,
                duration_ms,
            }) => {
                assert_eq!(operation, "initialize");
                assert_eq!(duration_ms, 5000);
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_no_timeout_passes_errors_through() {
        let result: CallboxResult<()> =
            with_timeout("x", None, async { Err(CallboxError::NotReady) }).await;
        assert!(matches!(result, Err(CallboxError::NotReady)));
    }
}
