//! Error kinds and failure classification for fetch operations.
//!
//! Every strategy reports failures as data (`StrategyResult`) rather than
//! unwinding across layers; this module supplies the typed kinds those
//! results carry and the classifier the retry controller and fallback
//! chain consult to decide between retrying, aborting, and skipping ahead.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::fetch::Strategy;

/// HTTP status codes worth retrying with backoff.
pub const RETRYABLE_HTTP_STATUS: &[u16] = &[429, 500, 502, 503, 504, 520, 521, 522, 523, 524];

/// HTTP status codes where retrying the same strategy is pointless.
pub const PERMANENT_HTTP_STATUS: &[u16] = &[400, 401, 404, 410];

/// Failure category, observable in telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Rejected before any network I/O
    InvalidUrl,
    /// May succeed on retry (connection reset, DNS, 5xx, timeout)
    Transient,
    /// Retry budget ignored; move to the next strategy
    Permanent,
    /// TLS handshake or certificate trouble; HTTP is hopeless
    SslConfig,
    /// 403 / captcha / WAF fingerprint; needs a real browser
    AntiBot,
    /// Headless strategy could not attach to a browser session
    BrowserUnavailable,
    /// Exceeded the context deadline
    Timeout,
    /// Operator interrupt during the manual strategy
    Cancelled,
}

impl ErrorKind {
    /// Whether the retry controller may try the same strategy again.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::Transient | Self::Timeout)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::InvalidUrl => "invalid_url",
            Self::Transient => "transient",
            Self::Permanent => "permanent",
            Self::SslConfig => "ssl_config",
            Self::AntiBot => "anti_bot",
            Self::BrowserUnavailable => "browser_unavailable",
            Self::Timeout => "timeout",
            Self::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Outcome of classifying one failure.
///
/// `suggested_fallback` names the strategy the fallback chain should jump
/// to directly, skipping intermediates (SSL trouble goes straight to the
/// headless browser, anti-bot walls toward the browser strategies).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub kind: ErrorKind,
    pub should_retry: bool,
    pub recommended_wait: Option<Duration>,
    pub suggested_fallback: Option<Strategy>,
}

impl Classification {
    const fn of(kind: ErrorKind) -> Self {
        Self {
            kind,
            should_retry: kind.is_retryable(),
            recommended_wait: None,
            suggested_fallback: None,
        }
    }

    const fn with_fallback(kind: ErrorKind, fallback: Strategy) -> Self {
        Self {
            kind,
            should_retry: false,
            recommended_wait: None,
            suggested_fallback: Some(fallback),
        }
    }
}

/// Classify an HTTP status code.
#[must_use]
pub fn classify_status(status: u16) -> Classification {
    if status == 403 {
        return Classification::with_fallback(ErrorKind::AntiBot, Strategy::Headless);
    }
    if RETRYABLE_HTTP_STATUS.contains(&status) {
        let mut c = Classification::of(ErrorKind::Transient);
        if status == 429 {
            // Respect the server: wait longer than the default backoff
            c.recommended_wait = Some(Duration::from_secs(5));
        }
        return c;
    }
    if PERMANENT_HTTP_STATUS.contains(&status) {
        return Classification::of(ErrorKind::Permanent);
    }
    // Unlisted 4xx are treated as permanent, unlisted 5xx as transient
    if (400..500).contains(&status) {
        Classification::of(ErrorKind::Permanent)
    } else {
        Classification::of(ErrorKind::Transient)
    }
}

/// Classify a transport-level `reqwest` error.
#[must_use]
pub fn classify_reqwest(err: &reqwest::Error) -> Classification {
    if err.is_timeout() {
        return Classification::of(ErrorKind::Timeout);
    }
    if let Some(status) = err.status() {
        return classify_status(status.as_u16());
    }
    let msg = format!("{err:?}").to_lowercase();
    if is_tls_message(&msg) {
        return Classification::with_fallback(ErrorKind::SslConfig, Strategy::Headless);
    }
    if err.is_connect() || err.is_request() || err.is_body() || err.is_decode() {
        return Classification::of(ErrorKind::Transient);
    }
    Classification::of(ErrorKind::Transient)
}

/// Classify an error by its message text.
///
/// Used where the concrete error type is gone (driver errors, recovery
/// command output) and only the rendered message survives.
#[must_use]
pub fn classify_message(msg: &str) -> Classification {
    let msg = msg.to_lowercase();

    if is_tls_message(&msg) {
        return Classification::with_fallback(ErrorKind::SslConfig, Strategy::Headless);
    }
    if msg.contains("429") || msg.contains("too many requests") || msg.contains("rate limit") {
        let mut c = Classification::of(ErrorKind::Transient);
        c.recommended_wait = Some(Duration::from_secs(5));
        return c;
    }
    if msg.contains("403") || msg.contains("forbidden") || msg.contains("captcha") {
        return Classification::with_fallback(ErrorKind::AntiBot, Strategy::Headless);
    }
    if msg.contains("timeout") || msg.contains("timed out") {
        return Classification::of(ErrorKind::Timeout);
    }
    if msg.contains("connection refused")
        || msg.contains("connection reset")
        || msg.contains("dns")
        || msg.contains("unreachable")
        || msg.contains("eof")
    {
        return Classification::of(ErrorKind::Transient);
    }
    if msg.contains("browser") || msg.contains("chrome") || msg.contains("cdp") {
        let mut c = Classification::of(ErrorKind::BrowserUnavailable);
        c.should_retry = false;
        return c;
    }
    Classification::of(ErrorKind::Transient)
}

fn is_tls_message(msg: &str) -> bool {
    msg.contains("ssl")
        || msg.contains("tls")
        || msg.contains("certificate")
        || msg.contains("handshake")
}

/// Content fingerprints of anti-bot interstitials.
///
/// A 200 response can still be a challenge page; the chain inspects the
/// body before accepting small responses as content.
#[must_use]
pub fn looks_like_anti_bot(html: &str) -> bool {
    // Only tiny pages are candidates; real articles are never this small
    if html.len() > 20 * 1024 {
        return false;
    }
    let lower = html.to_lowercase();
    const MARKERS: &[&str] = &[
        "captcha",
        "cf-browser-verification",
        "cf_chl_",
        "checking your browser",
        "verify you are a human",
        "access denied",
        "waf",
        "incapsula",
        "distil_r_captcha",
        "please enable javascript and cookies",
    ];
    MARKERS.iter().any(|m| lower.contains(m))
}

/// Top-level fetch failure returned by the dispatcher.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("fetch cancelled by operator for {url}")]
    Cancelled { url: String },

    #[error("all strategies failed for {url}:\n{outcomes}")]
    AllStrategiesFailed {
        url: String,
        /// One line per strategy: "  http: transient: connection reset"
        outcomes: String,
    },
}

impl FetchError {
    /// Telemetry kind for the final status field.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidUrl { .. } => ErrorKind::InvalidUrl,
            Self::Cancelled { .. } => ErrorKind::Cancelled,
            Self::AllStrategiesFailed { .. } => ErrorKind::Permanent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_statuses_map_to_transient() {
        for status in [429, 500, 502, 503, 504, 520, 524] {
            let c = classify_status(status);
            assert_eq!(c.kind, ErrorKind::Transient, "status {status}");
            assert!(c.should_retry, "status {status}");
        }
    }

    #[test]
    fn permanent_statuses_do_not_retry() {
        for status in [400, 401, 404, 410] {
            let c = classify_status(status);
            assert_eq!(c.kind, ErrorKind::Permanent);
            assert!(!c.should_retry);
        }
    }

    #[test]
    fn forbidden_suggests_headless() {
        let c = classify_status(403);
        assert_eq!(c.kind, ErrorKind::AntiBot);
        assert_eq!(c.suggested_fallback, Some(Strategy::Headless));
    }

    #[test]
    fn tls_messages_short_circuit() {
        let c = classify_message("SSL: CERTIFICATE_VERIFY_FAILED while connecting");
        assert_eq!(c.kind, ErrorKind::SslConfig);
        assert_eq!(c.suggested_fallback, Some(Strategy::Headless));
        assert!(!c.should_retry);
    }

    #[test]
    fn waf_fingerprints_detected() {
        assert!(looks_like_anti_bot(
            "<html><body>Checking your browser before accessing</body></html>"
        ));
        assert!(!looks_like_anti_bot("<html><body>Example Domain</body></html>"));
    }

    #[test]
    fn rate_limit_carries_longer_wait() {
        let c = classify_status(429);
        assert_eq!(c.recommended_wait, Some(Duration::from_secs(5)));
    }
}
