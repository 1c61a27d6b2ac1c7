//! Bounded retry with exponential backoff for remote calls.
//!
//! Only errors for which [`ExportError::is_retryable`] holds are retried.
//! A `Retry-After` hint from a 429 response takes precedence over the computed
//! delay. With `max_retries == 0` every failure is returned as-is.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::{ExportError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    pub max_retries: u32,
    #[serde(with = "duration_millis")]
    pub initial_delay: Duration,
    #[serde(with = "duration_millis")]
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Single attempt, no retry.
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Delay before retry number `attempt` (1-based), ignoring server hints.
    ///
    /// Never exceeds `max_delay`; a product that is not a valid duration
    /// (overflow, NaN, negative) falls back to `max_delay`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        Duration::try_from_secs_f64(secs)
            .map(|delay| delay.min(self.max_delay))
            .unwrap_or(self.max_delay)
    }

    /// Reject settings that cannot describe a growing, finite backoff.
    pub fn validate(&self) -> Result<()> {
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err(ExportError::Configuration(format!(
                "notion.retry.backoff_multiplier must be a finite number >= 1.0, got {}",
                self.backoff_multiplier
            )));
        }
        if self.initial_delay > self.max_delay {
            return Err(ExportError::Configuration(format!(
                "notion.retry.initial_delay ({:?}) exceeds max_delay ({:?})",
                self.initial_delay, self.max_delay
            )));
        }
        Ok(())
    }
}

/// Run `operation` until it succeeds, fails permanently, or retries run out.
pub async fn with_retry<F, Fut, T>(
    config: &RetryConfig,
    cancel: &CancellationToken,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    tracing::info!(attempts = attempt + 1, "Call succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) if e.is_retryable() && attempt < config.max_retries => {
                attempt += 1;
                let delay = match &e {
                    ExportError::RateLimited {
                        retry_after: Some(hint),
                        ..
                    } => (*hint).min(config.max_delay),
                    _ => config.backoff(attempt),
                };
                tracing::warn!(
                    error = %e,
                    attempt,
                    max_retries = config.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    "Call failed, retrying"
                );
                tokio::select! {
                    _ = cancel.cancelled() => return Err(ExportError::Cancelled),
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            Err(e) => {
                if e.is_retryable() {
                    tracing::error!(error = %e, attempts = attempt + 1, "Retries exhausted");
                }
                return Err(e);
            }
        }
    }
}

pub(crate) mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn limited() -> ExportError {
        ExportError::RateLimited {
            id: "p".into(),
            retry_after: None,
        }
    }

    #[test]
    fn backoff_grows_and_is_capped() {
        let cfg = RetryConfig {
            max_retries: 5,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(350),
            backoff_multiplier: 2.0,
        };
        assert_eq!(cfg.backoff(1), Duration::from_millis(100));
        assert_eq!(cfg.backoff(2), Duration::from_millis(200));
        assert_eq!(cfg.backoff(3), Duration::from_millis(350));
    }

    #[test]
    fn backoff_survives_huge_attempt_numbers() {
        let cfg = RetryConfig {
            max_retries: 2000,
            ..RetryConfig::default()
        };
        assert_eq!(cfg.backoff(1100), cfg.max_delay);
        assert_eq!(cfg.backoff(u32::MAX), cfg.max_delay);
    }

    #[test]
    fn backoff_with_bad_multiplier_does_not_panic() {
        for multiplier in [-2.0, f64::NAN, f64::INFINITY] {
            let cfg = RetryConfig {
                backoff_multiplier: multiplier,
                ..RetryConfig::default()
            };
            assert!(cfg.backoff(2) <= cfg.max_delay);
            assert!(matches!(cfg.validate(), Err(ExportError::Configuration(_))));
        }
    }

    #[test]
    fn validate_accepts_defaults_and_rejects_shrinking_backoff() {
        assert!(RetryConfig::default().validate().is_ok());
        assert!(RetryConfig::disabled().validate().is_ok());

        let shrinking = RetryConfig {
            backoff_multiplier: 0.5,
            ..RetryConfig::default()
        };
        assert!(shrinking.validate().is_err());

        let inverted = RetryConfig {
            initial_delay: Duration::from_secs(60),
            max_delay: Duration::from_secs(1),
            ..RetryConfig::default()
        };
        assert!(inverted.validate().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn retries_rate_limited_calls_then_succeeds() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result = with_retry(&RetryConfig::default(), &CancellationToken::new(), || {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(limited())
                } else {
                    Ok("done")
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_retries() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let cfg = RetryConfig {
            max_retries: 2,
            ..RetryConfig::default()
        };
        let result: Result<()> = with_retry(&cfg, &CancellationToken::new(), || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err(limited()) }
        })
        .await;
        assert!(matches!(result, Err(ExportError::RateLimited { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_errors_are_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result: Result<()> = with_retry(&RetryConfig::default(), &CancellationToken::new(), || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err(ExportError::NotFound { id: "gone".into() }) }
        })
        .await;
        assert!(matches!(result, Err(ExportError::NotFound { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
