//! Fetch telemetry carried through the pipeline.
//!
//! `FetchMetrics` is owned by the fallback chain and mutated exactly once
//! per strategy transition; `UrlMetadata` records what was asked for
//! versus what was actually fetched. Both flow with the result into the
//! emitted Markdown and the JSON export.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::fetch::Strategy;

/// Terminal state of a dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FinalStatus {
    #[default]
    Unknown,
    Success,
    Failed,
    Cancelled,
}

/// Aggregated telemetry for one URL across the whole strategy chain.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FetchMetrics {
    /// Strategy attempted first
    pub primary_method: Option<Strategy>,
    /// Strategy that succeeded after an earlier one failed
    pub fallback_method: Option<Strategy>,
    /// Attempts summed across all strategies
    pub total_attempts: u32,
    /// Wall-clock seconds spent fetching (HTTP transfer, browser attach)
    pub fetch_duration: f64,
    /// Wall-clock seconds spent waiting for browser rendering
    pub render_duration: f64,
    /// HTTP gave up on TLS and the chain jumped to the browser
    pub ssl_fallback_used: bool,
    /// A debug-protocol session was attached during this dispatch
    pub chrome_attached: bool,
    pub final_status: FinalStatus,
    pub error_message: Option<String>,
}

impl FetchMetrics {
    /// Record a strategy transition. The first call sets `primary_method`;
    /// any later strategy that ends up succeeding becomes
    /// `fallback_method` via [`FetchMetrics::record_success`].
    pub fn record_attempted(&mut self, strategy: Strategy) {
        if self.primary_method.is_none() {
            self.primary_method = Some(strategy);
        }
    }

    pub fn record_success(&mut self, strategy: Strategy) {
        self.final_status = FinalStatus::Success;
        self.error_message = None;
        if self.primary_method != Some(strategy) {
            self.fallback_method = Some(strategy);
        }
    }

    /// The method that actually produced the content.
    #[must_use]
    pub fn effective_method(&self) -> Option<Strategy> {
        self.fallback_method.or(self.primary_method)
    }

    /// One-line human-readable summary for the visible footer.
    #[must_use]
    pub fn summary(&self) -> String {
        let method = self
            .effective_method()
            .map_or_else(|| "none".to_string(), |m| m.to_string());
        let mut out = format!("Fetched via: {method}");
        if self.total_attempts > 1 {
            out.push_str(&format!(" | Attempts: {}", self.total_attempts));
        }
        let duration = self.fetch_duration + self.render_duration;
        if duration > 0.0 {
            out.push_str(&format!(" | Duration: {duration:.2}s"));
        }
        if self.ssl_fallback_used {
            out.push_str(" | SSL fallback used");
        }
        out
    }

    /// Detailed HTML comment block for the top of an emitted document.
    #[must_use]
    pub fn comment_block(&self) -> String {
        let fmt_opt = |s: Option<Strategy>| {
            s.map_or_else(|| "None".to_string(), |m| m.to_string())
        };
        format!(
            "<!-- Fetch Metrics:\n  Method: {}\n  Fallback: {}\n  Attempts: {}\n  Fetch Duration: {:.3}s\n  Render Duration: {:.3}s\n  SSL Fallback: {}\n  Chrome Attached: {}\n  Status: {}\n  Error: {}\n-->\n",
            fmt_opt(self.primary_method),
            fmt_opt(self.fallback_method),
            self.total_attempts,
            self.fetch_duration,
            self.render_duration,
            self.ssl_fallback_used,
            self.chrome_attached,
            status_str(self.final_status),
            self.error_message.as_deref().unwrap_or("None"),
        )
    }
}

fn status_str(status: FinalStatus) -> &'static str {
    match status {
        FinalStatus::Unknown => "unknown",
        FinalStatus::Success => "success",
        FinalStatus::Failed => "failed",
        FinalStatus::Cancelled => "cancelled",
    }
}

/// Bookkeeping for what was fetched and how.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UrlMetadata {
    /// URL exactly as the user supplied it
    pub input_url: String,
    /// URL after redirects; the base for link resolution and parsing
    pub final_url: String,
    /// Wall-clock time the fetch completed
    pub fetch_date: DateTime<Utc>,
    /// Strategy that produced the content
    pub fetch_mode: Strategy,
}

impl UrlMetadata {
    #[must_use]
    pub fn new(input_url: impl Into<String>, final_url: impl Into<String>, mode: Strategy) -> Self {
        Self {
            input_url: input_url.into(),
            final_url: final_url.into(),
            fetch_date: Utc::now(),
            fetch_mode: mode,
        }
    }

    /// True when a redirect changed the URL.
    #[must_use]
    pub fn was_redirected(&self) -> bool {
        self.input_url != self.final_url
    }
}

/// Wrap a Markdown body with the metrics comment and visible footer.
#[must_use]
pub fn embed_metrics(markdown: &str, metrics: &FetchMetrics) -> String {
    format!(
        "{}\n{}\n\n---\n\n*{}*\n",
        metrics.comment_block(),
        markdown.trim_end(),
        metrics.summary()
    )
}
