//! Cancellable injected delay.
//!
//! The wait is a single timer raced against the request's cancellation
//! token, all inside a hard bound of `delay + LATENCY_SAFETY_MARGIN`. No lock
//! is taken and no task is spawned. Dropping the future (an outer timeout, a
//! disconnected client) ends the wait as well.

use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::InjectionError;

/// Extra hold time allowed on top of the configured delay.
pub const LATENCY_SAFETY_MARGIN: Duration = Duration::from_secs(5);

/// Sleep for `delay` unless `cancel` fires first.
pub async fn wait_injected_delay(
    delay: Duration,
    cancel: Option<&CancellationToken>,
) -> Result<(), InjectionError> {
    let started = Instant::now();
    let bound = delay.saturating_add(LATENCY_SAFETY_MARGIN);

    let wait = async {
        match cancel {
            Some(token) => {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => false,
                    _ = tokio::time::sleep(delay) => true,
                }
            }
            None => {
                tokio::time::sleep(delay).await;
                true
            }
        }
    };

    match tokio::time::timeout(bound, wait).await {
        Ok(true) => Ok(()),
        Ok(false) | Err(_) => Err(InjectionError::Cancelled {
            elapsed: started.elapsed(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_full_delay_elapses() {
        let started = Instant::now();
        wait_injected_delay(Duration::from_millis(100), None)
            .await
            .unwrap();
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(100));
        assert!(elapsed < Duration::from_millis(400), "elapsed = {:?}", elapsed);
    }

    #[tokio::test]
    async fn test_cancellation_cuts_delay_short() {
        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            canceller.cancel();
        });

        let started = Instant::now();
        let result = wait_injected_delay(Duration::from_millis(500), Some(&token)).await;
        let elapsed = started.elapsed();

        assert!(matches!(result, Err(InjectionError::Cancelled { .. })));
        assert!(elapsed >= Duration::from_millis(200));
        assert!(elapsed < Duration::from_millis(450), "elapsed = {:?}", elapsed);
    }

    #[tokio::test]
    async fn test_already_cancelled_returns_immediately() {
        let token = CancellationToken::new();
        token.cancel();
        let started = Instant::now();
        let result = wait_injected_delay(Duration::from_secs(5), Some(&token)).await;
        assert!(result.is_err());
        assert!(started.elapsed() < Duration::from_millis(100));
    }
}
