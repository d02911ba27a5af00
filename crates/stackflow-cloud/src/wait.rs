//! Readiness polling
//!
//! Remote resources often exist before they are usable (a function is
//! `Pending`, a new role is not yet assumable). Control planes poll with a
//! fixed delay and a bounded number of attempts.

use crate::error::{CloudError, Result};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Fixed-delay polling bounds
#[derive(Debug, Clone)]
pub struct WaitConfig {
    /// Delay between checks
    pub delay: Duration,
    /// Checks before giving up
    pub max_attempts: u32,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(5),
            max_attempts: 12,
        }
    }
}

impl WaitConfig {
    /// Twice the default budget, for slow resources such as functions
    pub fn long() -> Self {
        Self {
            max_attempts: 24,
            ..Default::default()
        }
    }

    /// No delay between attempts
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            delay: Duration::ZERO,
            max_attempts,
        }
    }

    fn total(&self) -> Duration {
        self.delay * self.max_attempts
    }
}

/// Poll `check` until it returns `Ok(true)`.
///
/// Errors from `check` end the wait immediately. Running out of attempts is
/// [`CloudError::Timeout`].
pub async fn wait_until<F, Fut>(config: &WaitConfig, what: &str, mut check: F) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    for attempt in 1..=config.max_attempts {
        if check().await? {
            debug!(resource = %what, attempt, "Resource ready");
            return Ok(());
        }
        debug!(
            resource = %what,
            attempt,
            delay_ms = config.delay.as_millis() as u64,
            "Resource not ready, retrying"
        );
        if attempt < config.max_attempts {
            tokio::time::sleep(config.delay).await;
        }
    }

    Err(CloudError::Timeout(format!(
        "{} not ready after {} attempts ({:?})",
        what,
        config.max_attempts,
        config.total()
    )))
}

/// Run `op`, retrying while it fails with [`CloudError::DependencyNotReady`].
///
/// Used where the remote API rejects a request because something it refers
/// to has been created but has not propagated yet. The last error is
/// returned once attempts run out.
pub async fn retry_while_not_ready<T, F, Fut>(config: &WaitConfig, what: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match op().await {
            Err(CloudError::DependencyNotReady(reason)) if attempt < config.max_attempts => {
                warn!(resource = %what, attempt, reason = %reason, "Dependency not ready, retrying");
                tokio::time::sleep(config.delay).await;
            }
            other => return other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_wait_succeeds_immediately() {
        let result = wait_until(&WaitConfig::immediate(3), "test-resource", || async {
            Ok(true)
        })
        .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_wait_retries_then_succeeds() {
        let counter = Arc::new(AtomicU32::new(0));
        let c = counter.clone();

        let result = wait_until(&WaitConfig::immediate(5), "test-resource", move || {
            let c = c.clone();
            async move { Ok(c.fetch_add(1, Ordering::SeqCst) >= 2) }
        })
        .await;

        assert!(result.is_ok());
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_wait_times_out() {
        let result = wait_until(&WaitConfig::immediate(3), "test-resource", || async {
            Ok(false)
        })
        .await;

        match result {
            Err(CloudError::Timeout(message)) => assert!(message.contains("test-resource")),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_wait_check_error_stops() {
        let result = wait_until(&WaitConfig::immediate(3), "test-resource", || async {
            Err(CloudError::ApiError("check failed".to_string()))
        })
        .await;

        assert!(matches!(result, Err(CloudError::ApiError(_))));
    }

    #[tokio::test]
    async fn test_retry_while_not_ready() {
        let counter = Arc::new(AtomicU32::new(0));
        let c = counter.clone();

        let result = retry_while_not_ready(&WaitConfig::immediate(5), "fn", move || {
            let c = c.clone();
            async move {
                if c.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(CloudError::DependencyNotReady("role cannot be assumed".to_string()))
                } else {
                    Ok("created")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "created");
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_gives_up_with_last_error() {
        let result: Result<()> = retry_while_not_ready(&WaitConfig::immediate(2), "fn", || async {
            Err(CloudError::DependencyNotReady("still propagating".to_string()))
        })
        .await;

        assert!(matches!(result, Err(CloudError::DependencyNotReady(_))));
    }

    #[tokio::test]
    async fn test_retry_does_not_retry_other_errors() {
        let counter = Arc::new(AtomicU32::new(0));
        let c = counter.clone();

        let result: Result<()> = retry_while_not_ready(&WaitConfig::immediate(5), "fn", move || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err(CloudError::ResourceAlreadyExists("fn".to_string()))
            }
        })
        .await;

        assert!(result.unwrap_err().is_already_exists());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
