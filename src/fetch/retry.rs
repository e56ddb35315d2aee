//! Retry controller: drives one strategy through its attempt budget.
//!
//! Between attempts it sleeps `base * 2^retry + jitter`; on each failure
//! it consults the classification and bails out early for anything that
//! is not transient, handing the classification back to the fallback
//! chain. The controller owns no shared state and returns a
//! `StrategyResult` by value.

use std::future::Future;
use std::time::{Duration, Instant};

use log::warn;
use rand::Rng;

use crate::error::{Classification, ErrorKind};
use crate::fetch::{FetchContext, StrategyResult};
use crate::utils::constants::{BASE_DELAY_SECS, MAX_JITTER_SECS};

/// One successful attempt, before aggregation into a `StrategyResult`.
#[derive(Debug)]
pub struct Attempt {
    pub html: String,
    pub final_url: String,
    pub truncated: bool,
    pub encoding: Option<String>,
    pub ssl_fallback_used: bool,
    pub chrome_attached: bool,
    /// Seconds spent waiting on browser rendering (zero for plain HTTP)
    pub render_secs: f64,
}

/// One failed attempt with its classification.
#[derive(Debug)]
pub struct AttemptError {
    pub classification: Classification,
    pub message: String,
}

impl AttemptError {
    #[must_use]
    pub fn new(classification: Classification, message: impl Into<String>) -> Self {
        Self {
            classification,
            message: message.into(),
        }
    }
}

/// Exponential backoff with jitter: 1s, 2s, 4s, ... before retry `n`.
#[must_use]
pub fn backoff_delay(retry: u32) -> Duration {
    let base = BASE_DELAY_SECS * f64::from(2u32.pow(retry.min(16)));
    let jitter = rand::rng().random_range(0.0..MAX_JITTER_SECS);
    Duration::from_secs_f64(base + jitter)
}

/// Run `attempt` up to `ctx.max_retries + 1` times.
///
/// The whole of each attempt runs under the context deadline; expiry is
/// classified as a transient timeout so the remaining budget can absorb
/// it. A retry budget of zero means exactly one attempt.
pub async fn run_with_retry<F, Fut>(ctx: &FetchContext, mut attempt: F) -> StrategyResult
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Attempt, AttemptError>>,
{
    let start = Instant::now();
    let total_attempts = ctx.max_retries + 1;
    let mut last: Option<AttemptError> = None;
    let mut attempts_made = 0u32;

    for n in 0..total_attempts {
        if n > 0 {
            // Classification may recommend a longer wait (e.g. HTTP 429)
            let mut delay = backoff_delay(n - 1);
            if let Some(wait) = last.as_ref().and_then(|e| e.classification.recommended_wait) {
                delay = delay.max(wait);
            }
            warn!(
                "retry {n}/{} for {} after {:.1}s",
                ctx.max_retries,
                ctx.url,
                delay.as_secs_f64()
            );
            tokio::time::sleep(delay).await;
        }

        attempts_made = n + 1;
        let outcome = match tokio::time::timeout(ctx.timeout, attempt(n)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(AttemptError::new(
                Classification {
                    kind: ErrorKind::Timeout,
                    should_retry: true,
                    recommended_wait: None,
                    suggested_fallback: None,
                },
                format!("deadline of {:?} exceeded", ctx.timeout),
            )),
        };

        match outcome {
            Ok(attempt) => {
                let mut result = StrategyResult::succeeded(
                    attempt.html,
                    attempt.final_url,
                    n + 1,
                    start.elapsed(),
                );
                result.truncated = attempt.truncated;
                result.encoding = attempt.encoding;
                result.ssl_fallback_used = attempt.ssl_fallback_used;
                result.chrome_attached = attempt.chrome_attached;
                result.render_secs = attempt.render_secs;
                return result;
            }
            Err(err) => {
                warn!(
                    "attempt {}/{total_attempts} failed for {}: {}: {}",
                    n + 1,
                    ctx.url,
                    err.classification.kind,
                    err.message
                );
                let bail = !err.classification.should_retry;
                last = Some(err);
                if bail {
                    break;
                }
            }
        }
    }

    let err = last.unwrap_or_else(|| {
        AttemptError::new(
            Classification {
                kind: ErrorKind::Permanent,
                should_retry: false,
                recommended_wait: None,
                suggested_fallback: None,
            },
            "no attempts were made",
        )
    });
    StrategyResult::failed(err.classification, err.message, attempts_made, start.elapsed())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn transient() -> Classification {
        Classification {
            kind: ErrorKind::Transient,
            should_retry: true,
            recommended_wait: None,
            suggested_fallback: None,
        }
    }

    fn permanent() -> Classification {
        Classification {
            kind: ErrorKind::Permanent,
            should_retry: false,
            recommended_wait: None,
            suggested_fallback: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_retry_until_success() {
        let ctx = FetchContext::new("https://example.com").with_max_retries(3);
        let calls = AtomicU32::new(0);

        let result = run_with_retry(&ctx, |_| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(AttemptError::new(transient(), "503 service unavailable"))
                } else {
                    Ok(Attempt {
                        html: "<html></html>".into(),
                        final_url: "https://example.com/".into(),
                        truncated: false,
                        encoding: Some("utf-8".into()),
                        ssl_fallback_used: false,
                        chrome_attached: false,
                        render_secs: 0.0,
                    })
                }
            }
        })
        .await;

        assert!(result.success);
        assert_eq!(result.attempts, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_failure_exits_without_retry() {
        let ctx = FetchContext::new("https://example.com").with_max_retries(3);
        let calls = AtomicU32::new(0);

        let result = run_with_retry(&ctx, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(AttemptError::new(permanent(), "404 not found")) }
        })
        .await;

        assert!(!result.success);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(result.error_kind, Some(ErrorKind::Permanent));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_retry_budget_means_one_attempt() {
        let ctx = FetchContext::new("https://example.com").with_max_retries(0);
        let calls = AtomicU32::new(0);

        let result = run_with_retry(&ctx, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(AttemptError::new(transient(), "connection reset")) }
        })
        .await;

        assert!(!result.success);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_grows_exponentially() {
        let d0 = backoff_delay(0);
        let d1 = backoff_delay(1);
        assert!(d0 >= Duration::from_secs(1) && d0 < Duration::from_millis(1100));
        assert!(d1 >= Duration::from_secs(2) && d1 < Duration::from_millis(2100));
    }
}
