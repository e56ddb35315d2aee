//! Fallback chain: runs strategies in order until one succeeds.
//!
//! The chain owns the metrics for a dispatch, accumulates failures as
//! context for later strategies, and may short-circuit past intermediate
//! strategies when a classification names a better target (TLS trouble
//! jumps straight to the browser). No strategy runs twice for the same
//! URL, which is what keeps the chain loop-free.

use async_trait::async_trait;
use log::{debug, info, warn};

use crate::config::CrawlConfig;
use crate::error::{ErrorKind, FetchError};
use crate::fetch::headless::HeadlessStrategy;
use crate::fetch::http::HttpStrategy;
use crate::fetch::manual::ManualStrategy;
use crate::fetch::session::DebugSession;
use crate::fetch::{FetchContext, Strategy, StrategyResult};
use crate::metrics::{FetchMetrics, FinalStatus, UrlMetadata};

/// Executes a single strategy for the chain.
///
/// The production implementation wires the real strategies; tests script
/// outcomes per strategy.
#[async_trait]
pub trait StrategyExecutor: Send + Sync {
    async fn execute(
        &self,
        strategy: Strategy,
        ctx: &FetchContext,
        prior_failures: &[String],
    ) -> StrategyResult;

    /// Whether a strategy may run at all (the manual strategy is gated
    /// by configuration and skipped silently when off).
    fn available(&self, _strategy: Strategy) -> bool {
        true
    }
}

/// Successful dispatch: content plus its telemetry.
#[derive(Debug)]
pub struct DispatchOutcome {
    pub html: String,
    pub final_url: String,
    pub metrics: FetchMetrics,
    pub metadata: UrlMetadata,
    pub truncated: bool,
    pub encoding: Option<String>,
}

/// Failed dispatch: the composite error plus the telemetry gathered so far.
#[derive(Debug)]
pub struct DispatchFailure {
    pub error: FetchError,
    pub metrics: FetchMetrics,
}

/// Ordered list of strategies for one URL.
#[derive(Debug, Clone)]
pub struct FallbackChain {
    strategies: Vec<Strategy>,
}

impl FallbackChain {
    /// Build from a routing-policy order. Duplicates are dropped so no
    /// strategy can ever run twice in a dispatch.
    #[must_use]
    pub fn new(strategies: Vec<Strategy>) -> Self {
        let mut unique = Vec::with_capacity(strategies.len());
        for s in strategies {
            if !unique.contains(&s) {
                unique.push(s);
            }
        }
        Self { strategies: unique }
    }

    #[must_use]
    pub fn strategies(&self) -> &[Strategy] {
        &self.strategies
    }

    /// Run the chain for one URL.
    ///
    /// `input_url` is the URL exactly as the user supplied it, preserved
    /// in the metadata alongside the redirected final URL.
    pub async fn dispatch<E: StrategyExecutor>(
        &self,
        ctx: &FetchContext,
        executor: &E,
        input_url: &str,
    ) -> Result<DispatchOutcome, Box<DispatchFailure>> {
        let mut metrics = FetchMetrics::default();
        let mut failures: Vec<String> = Vec::new();
        let mut jump_to: Option<Strategy> = None;

        for (idx, &strategy) in self.strategies.iter().enumerate() {
            if let Some(target) = jump_to {
                if strategy != target {
                    debug!("short-circuit past {strategy} toward {target} for {}", ctx.url);
                    continue;
                }
                jump_to = None;
            }

            if !executor.available(strategy) {
                debug!("strategy {strategy} disabled, skipping for {}", ctx.url);
                continue;
            }

            info!("trying strategy {strategy} for {}", ctx.url);
            metrics.record_attempted(strategy);

            let result = executor.execute(strategy, ctx, &failures).await;

            metrics.total_attempts += result.attempts;
            metrics.fetch_duration += (result.duration.as_secs_f64() - result.render_secs).max(0.0);
            metrics.render_duration += result.render_secs;
            metrics.chrome_attached |= result.chrome_attached;
            metrics.ssl_fallback_used |= result.ssl_fallback_used;

            if result.success {
                metrics.record_success(strategy);
                let final_url = result.final_url.unwrap_or_else(|| ctx.url.clone());
                let html = result.html.unwrap_or_default();
                let metadata = UrlMetadata::new(input_url, final_url.clone(), strategy);
                return Ok(DispatchOutcome {
                    html,
                    final_url,
                    metrics,
                    metadata,
                    truncated: result.truncated,
                    encoding: result.encoding,
                });
            }

            let line = format!("{strategy}: {}", result.outcome_line());
            warn!("strategy failed for {}: {line}", ctx.url);
            metrics.error_message = result.error_message.clone();
            failures.push(line);

            if result.error_kind == Some(ErrorKind::Cancelled) {
                metrics.final_status = FinalStatus::Cancelled;
                return Err(Box::new(DispatchFailure {
                    error: FetchError::Cancelled {
                        url: ctx.url.clone(),
                    },
                    metrics,
                }));
            }

            if result.error_kind == Some(ErrorKind::SslConfig) {
                metrics.ssl_fallback_used = true;
            }

            // Classification may name the strategy to jump to, skipping
            // intermediates, but never backwards
            if let Some(target) = result.classification.and_then(|c| c.suggested_fallback) {
                let remaining = &self.strategies[idx + 1..];
                if remaining.contains(&target) {
                    info!("short-circuiting to {target} for {}", ctx.url);
                    jump_to = Some(target);
                }
            }
        }

        metrics.final_status = FinalStatus::Failed;
        let outcomes = if failures.is_empty() {
            "  (no strategy was available to run)".to_string()
        } else {
            failures
                .iter()
                .map(|f| format!("  {f}"))
                .collect::<Vec<_>>()
                .join("\n")
        };
        Err(Box::new(DispatchFailure {
            error: FetchError::AllStrategiesFailed {
                url: ctx.url.clone(),
                outcomes,
            },
            metrics,
        }))
    }
}

/// Production executor wiring the three concrete strategies.
pub struct StrategySet {
    http: HttpStrategy,
    headless: HeadlessStrategy,
    manual: ManualStrategy,
}

impl StrategySet {
    /// Build the strategies from configuration. The two browser-backed
    /// strategies share one debug-session handle.
    pub fn from_config(config: &CrawlConfig) -> anyhow::Result<Self> {
        let session = DebugSession::new(
            config.debug_endpoint(),
            config.session_recovery_cmd().map(str::to_string),
        );
        Ok(Self {
            http: HttpStrategy::new()?,
            headless: HeadlessStrategy::new(session.clone(), config.scroll_to_bottom()),
            manual: ManualStrategy::new(session, config.manual_enabled()),
        })
    }
}

#[async_trait]
impl StrategyExecutor for StrategySet {
    async fn execute(
        &self,
        strategy: Strategy,
        ctx: &FetchContext,
        prior_failures: &[String],
    ) -> StrategyResult {
        match strategy {
            Strategy::Http => self.http.fetch(ctx).await,
            Strategy::Headless => self.headless.fetch(ctx).await,
            Strategy::Manual => self.manual.fetch(ctx, prior_failures).await,
        }
    }

    fn available(&self, strategy: Strategy) -> bool {
        match strategy {
            Strategy::Manual => self.manual.is_enabled(),
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Classification;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Scripted executor: each strategy returns a queued result.
    struct Scripted {
        results: Mutex<HashMap<Strategy, StrategyResult>>,
        calls: Mutex<Vec<Strategy>>,
        manual_enabled: bool,
    }

    impl Scripted {
        fn new(results: Vec<(Strategy, StrategyResult)>) -> Self {
            Self {
                results: Mutex::new(results.into_iter().collect()),
                calls: Mutex::new(Vec::new()),
                manual_enabled: true,
            }
        }

        fn calls(&self) -> Vec<Strategy> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl StrategyExecutor for Scripted {
        async fn execute(
            &self,
            strategy: Strategy,
            _ctx: &FetchContext,
            _prior: &[String],
        ) -> StrategyResult {
            self.calls.lock().unwrap().push(strategy);
            self.results
                .lock()
                .unwrap()
                .remove(&strategy)
                .unwrap_or_else(|| failed(ErrorKind::Permanent, None))
        }

        fn available(&self, strategy: Strategy) -> bool {
            strategy != Strategy::Manual || self.manual_enabled
        }
    }

    fn success(attempts: u32) -> StrategyResult {
        StrategyResult::succeeded(
            "<html>ok</html>".into(),
            "https://example.com/final".into(),
            attempts,
            Duration::from_millis(10),
        )
    }

    fn failed(kind: ErrorKind, fallback: Option<Strategy>) -> StrategyResult {
        StrategyResult::failed(
            Classification {
                kind,
                should_retry: false,
                recommended_wait: None,
                suggested_fallback: fallback,
            },
            format!("{kind} failure"),
            1,
            Duration::from_millis(5),
        )
    }

    fn chain() -> FallbackChain {
        FallbackChain::new(vec![Strategy::Http, Strategy::Headless, Strategy::Manual])
    }

    #[tokio::test]
    async fn first_success_stops_the_chain() {
        let executor = Scripted::new(vec![(Strategy::Http, success(1))]);
        let ctx = FetchContext::new("https://example.com");

        let outcome = chain().dispatch(&ctx, &executor, "https://example.com").await.unwrap();
        assert_eq!(executor.calls(), vec![Strategy::Http]);
        assert_eq!(outcome.metrics.primary_method, Some(Strategy::Http));
        assert_eq!(outcome.metrics.fallback_method, None);
        assert_eq!(outcome.metrics.total_attempts, 1);
    }

    #[tokio::test]
    async fn later_success_sets_fallback_method() {
        let executor = Scripted::new(vec![
            (Strategy::Http, failed(ErrorKind::Permanent, None)),
            (Strategy::Headless, success(1)),
        ]);
        let ctx = FetchContext::new("https://example.com");

        let outcome = chain().dispatch(&ctx, &executor, "https://example.com").await.unwrap();
        assert_eq!(executor.calls(), vec![Strategy::Http, Strategy::Headless]);
        assert_eq!(outcome.metrics.primary_method, Some(Strategy::Http));
        assert_eq!(outcome.metrics.fallback_method, Some(Strategy::Headless));
        assert_eq!(outcome.metadata.fetch_mode, Strategy::Headless);
    }

    #[tokio::test]
    async fn ssl_failure_marks_fallback_flag() {
        let executor = Scripted::new(vec![
            (
                Strategy::Http,
                failed(ErrorKind::SslConfig, Some(Strategy::Headless)),
            ),
            (Strategy::Headless, success(1)),
        ]);
        let ctx = FetchContext::new("https://example.com");

        let outcome = chain().dispatch(&ctx, &executor, "https://example.com").await.unwrap();
        assert!(outcome.metrics.ssl_fallback_used);
        assert_eq!(outcome.metrics.fallback_method, Some(Strategy::Headless));
    }

    #[tokio::test]
    async fn anti_bot_short_circuits_to_suggested_target() {
        let order = FallbackChain::new(vec![Strategy::Http, Strategy::Headless, Strategy::Manual]);
        let executor = Scripted::new(vec![
            (Strategy::Http, failed(ErrorKind::AntiBot, Some(Strategy::Manual))),
            (Strategy::Manual, success(1)),
        ]);
        let ctx = FetchContext::new("https://example.com");

        let outcome = order.dispatch(&ctx, &executor, "https://example.com").await.unwrap();
        // Headless was skipped entirely
        assert_eq!(executor.calls(), vec![Strategy::Http, Strategy::Manual]);
        assert_eq!(outcome.metrics.fallback_method, Some(Strategy::Manual));
    }

    #[tokio::test]
    async fn cancellation_stops_the_chain() {
        let executor = Scripted::new(vec![
            (Strategy::Http, failed(ErrorKind::Permanent, None)),
            (Strategy::Headless, failed(ErrorKind::Cancelled, None)),
        ]);
        let ctx = FetchContext::new("https://example.com");

        let failure = chain().dispatch(&ctx, &executor, "https://example.com").await.unwrap_err();
        assert!(matches!(failure.error, FetchError::Cancelled { .. }));
        assert_eq!(failure.metrics.final_status, FinalStatus::Cancelled);
        // Manual never ran after the cancellation
        assert_eq!(executor.calls(), vec![Strategy::Http, Strategy::Headless]);
    }

    #[tokio::test]
    async fn total_failure_lists_every_outcome() {
        let executor = Scripted::new(vec![
            (Strategy::Http, failed(ErrorKind::Permanent, None)),
            (Strategy::Headless, failed(ErrorKind::BrowserUnavailable, None)),
            (Strategy::Manual, failed(ErrorKind::Permanent, None)),
        ]);
        let ctx = FetchContext::new("https://example.com");

        let failure = chain().dispatch(&ctx, &executor, "https://example.com").await.unwrap_err();
        match &failure.error {
            FetchError::AllStrategiesFailed { outcomes, .. } => {
                assert!(outcomes.contains("http:"));
                assert!(outcomes.contains("headless:"));
                assert!(outcomes.contains("manual:"));
            }
            other => panic!("expected AllStrategiesFailed, got {other:?}"),
        }
        assert_eq!(failure.metrics.final_status, FinalStatus::Failed);
    }

    #[tokio::test]
    async fn attempts_accumulate_across_strategies() {
        let mut http_fail = failed(ErrorKind::Permanent, None);
        http_fail.attempts = 4;
        let executor = Scripted::new(vec![
            (Strategy::Http, http_fail),
            (Strategy::Headless, success(2)),
        ]);
        let ctx = FetchContext::new("https://example.com");

        let outcome = chain().dispatch(&ctx, &executor, "https://example.com").await.unwrap();
        assert_eq!(outcome.metrics.total_attempts, 6);
    }

    #[test]
    fn duplicate_strategies_are_deduped() {
        let chain = FallbackChain::new(vec![Strategy::Http, Strategy::Http, Strategy::Headless]);
        assert_eq!(chain.strategies(), &[Strategy::Http, Strategy::Headless]);
    }
}
