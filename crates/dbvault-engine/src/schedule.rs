//! Time bounds and tick sources shared by the recurring tasks

use dbvault_core::errors::{Result, VaultError};
use std::future::Future;
use std::time::Duration;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

/// Run `fut`, failing with `ERR_TIMEOUT` once `limit` has elapsed
pub async fn bounded<T, F>(op: &str, limit: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(VaultError::TimedOut {
            op: op.to_string(),
            secs: limit.as_secs(),
        }
        .into()),
    }
}

/// Ticker whose first tick fires one full `period` from now
///
/// Ticks missed while a cycle runs long are dropped, never bunched up.
pub fn ticker(period: Duration) -> Interval {
    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval
}

#[cfg(test)]
mod tests {
    use super::*;
    use dbvault_core::errors::ExErrorKind;

    #[tokio::test]
    async fn test_bounded_passes_result_through() {
        let value = bounded("noop", Duration::from_secs(1), async { Ok(7) })
            .await
            .unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bounded_times_out() {
        let err = bounded("list", Duration::from_secs(2), async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(())
        })
        .await
        .unwrap_err();

        assert_eq!(err.kind(), ExErrorKind::Timeout);
        assert_eq!(err.op(), Some("list"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticker_skips_immediate_tick() {
        let start = Instant::now();
        let mut t = ticker(Duration::from_secs(60));
        t.tick().await;
        assert!(start.elapsed() >= Duration::from_secs(60));
    }
}
