//!
//! Randomised exponential backoff for the client wrapper's connect retry
//! loop, and the forbidden/transient predicate that decides whether a given
//! connect failure is retried at all.
//!

use crate::error::{Error, TransportError};
use std::time::Duration;
use tracing::warn;

/// Backoff bounds and enable switch for [`crate::client::Client::connect`]'s
/// retry loop. `Disabled` short-circuits retry entirely: the first connect
/// failure is returned as-is.
#[derive(Debug, Clone)]
pub enum RetryConfig {
    Disabled,
    Enabled {
        min_delay: Duration,
        max_delay: Duration,
    },
}

impl Default for RetryConfig {
    /// Matches the spec's default randomised exponential backoff range.
    fn default() -> Self {
        RetryConfig::Enabled {
            min_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(120),
        }
    }
}

impl RetryConfig {
    pub fn disabled() -> Self {
        RetryConfig::Disabled
    }
}

/// `true` iff `err` should be retried. Forbidden auth (HTTP 401/403) is the
/// only non-retryable outcome; everything else — DNS failure, refused
/// connection, handshake error, even non-transport errors surfaced through
/// the same call site — retries.
pub fn is_retryable(err: &Error) -> bool {
    !matches!(err, Error::Transport(TransportError::Forbidden(_)))
}

/// Randomised exponential backoff: doubles the delay each attempt, clamped
/// to `max_delay`, with full jitter (a uniform random fraction of the
/// computed delay) so many reconnecting clients don't thunder together.
pub struct Backoff {
    min_delay: Duration,
    max_delay: Duration,
    attempt: u32,
}

impl Backoff {
    pub fn new(min_delay: Duration, max_delay: Duration) -> Self {
        Backoff {
            min_delay,
            max_delay,
            attempt: 0,
        }
    }

    /// Sleeps for this attempt's randomised delay, then advances to the next.
    pub async fn wait(&mut self) {
        let exp = self.min_delay.as_millis().max(1) * (1u128 << self.attempt.min(20));
        let capped = exp.min(self.max_delay.as_millis());
        let jittered = rand::random::<f64>() * capped as f64;
        self.attempt = self.attempt.saturating_add(1);
        tokio::time::sleep(Duration::from_millis(jittered as u64)).await;
    }
}

/// Runs `connect` in a loop per `config`, retrying non-forbidden failures
/// with randomised exponential backoff, reraising after the predicate
/// rejects retry. Logs the last exception on each retry attempt.
pub async fn with_retry<F, Fut, T>(config: &RetryConfig, mut connect: F) -> crate::error::Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = crate::error::Result<T>>,
{
    let (min_delay, max_delay) = match config {
        RetryConfig::Disabled => return connect().await,
        RetryConfig::Enabled { min_delay, max_delay } => (*min_delay, *max_delay),
    };

    let mut backoff = Backoff::new(min_delay, max_delay);
    loop {
        match connect().await {
            Ok(value) => return Ok(value),
            Err(err) if is_retryable(&err) => {
                warn!(error = %err, "connect attempt failed, retrying with backoff");
                backoff.wait().await;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forbidden_is_not_retryable() {
        let err = Error::Transport(TransportError::Forbidden("no header".into()));
        assert!(!is_retryable(&err));
    }

    #[test]
    fn transient_is_retryable() {
        let err = Error::Transport(TransportError::Transient("refused".into()));
        assert!(is_retryable(&err));
    }

    #[test]
    fn other_errors_are_retryable() {
        assert!(is_retryable(&Error::Timeout));
    }

    #[tokio::test]
    async fn disabled_config_never_retries() {
        let mut attempts = 0;
        let result: crate::error::Result<()> = with_retry(&RetryConfig::Disabled, || {
            attempts += 1;
            async { Err(Error::Transport(TransportError::Transient("down".into()))) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(attempts, 1);
    }

    #[tokio::test]
    async fn forbidden_short_circuits_even_with_retry_enabled() {
        let config = RetryConfig::Enabled {
            min_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
        };
        let mut attempts = 0;
        let result: crate::error::Result<()> = with_retry(&config, || {
            attempts += 1;
            async { Err(Error::Transport(TransportError::Forbidden("no header".into()))) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(attempts, 1);
    }

    #[tokio::test]
    async fn retries_until_success() {
        let config = RetryConfig::Enabled {
            min_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
        };
        let mut attempts = 0;
        let result = with_retry(&config, || {
            attempts += 1;
            let attempt = attempts;
            async move {
                if attempt < 3 {
                    Err(Error::Transport(TransportError::Transient("down".into())))
                } else {
                    Ok(42)
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(result, 42);
        assert_eq!(attempts, 3);
    }
}
