//! Fixed-cadence status polling.

use std::future::Future;
use std::time::Duration;

use forcesync_protocol::constants::DEFAULT_POLL_INTERVAL;
use tracing::debug;

use crate::error::DeployError;

/// How a job's status is polled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// Delay between two status checks.
    pub interval: Duration,
    /// Give up after this many checks. `None` polls until the job ends.
    pub max_attempts: Option<u32>,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_attempts: None,
        }
    }
}

/// Calls `tick` until it yields a value.
///
/// The first check runs immediately; later ones wait `config.interval`
/// after the previous check returned. `tick` receives the 1-based attempt
/// number and returns `Ok(None)` while the job is still pending. A tick
/// error ends the loop and is returned as-is.
pub async fn poll_until<T, F, Fut>(config: &PollConfig, mut tick: F) -> Result<T, DeployError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Option<T>, DeployError>>,
{
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        if let Some(done) = tick(attempt).await? {
            return Ok(done);
        }
        if config.max_attempts.is_some_and(|max| attempt >= max) {
            return Err(DeployError::PollTimeout { attempts: attempt });
        }
        debug!(attempt, "job pending");
        tokio::time::sleep(config.interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn polls_at_fixed_interval() {
        let ticks = Mutex::new(Vec::new());
        let config = PollConfig::default();

        let value = poll_until(&config, |attempt| {
            ticks.lock().unwrap().push(Instant::now());
            async move { Ok((attempt == 3).then_some("done")) }
        })
        .await
        .unwrap();
        assert_eq!(value, "done");

        let ticks = ticks.into_inner().unwrap();
        assert_eq!(ticks.len(), 3);
        for pair in ticks.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_millis(500));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn first_check_is_immediate() {
        let start = Instant::now();
        let value = poll_until(&PollConfig::default(), |_| async { Ok(Some(7)) })
            .await
            .unwrap();
        assert_eq!(value, 7);
        assert_eq!(Instant::now(), start);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_attempts() {
        let config = PollConfig {
            interval: Duration::from_millis(100),
            max_attempts: Some(4),
        };
        let mut calls = 0;
        let err = poll_until(&config, |_| {
            calls += 1;
            async { Ok::<Option<()>, _>(None) }
        })
        .await
        .unwrap_err();
        assert!(matches!(err, DeployError::PollTimeout { attempts: 4 }));
        assert_eq!(calls, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn tick_error_stops_loop() {
        let mut calls = 0;
        let err = poll_until(&PollConfig::default(), |attempt| {
            calls += 1;
            async move {
                if attempt == 2 {
                    Err(DeployError::PollTransport("connection reset".into()))
                } else {
                    Ok::<Option<()>, _>(None)
                }
            }
        })
        .await
        .unwrap_err();
        assert!(matches!(err, DeployError::PollTransport(_)));
        assert_eq!(calls, 2);
    }
}
