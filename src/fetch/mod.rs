//! Fetch strategies and the orchestration that sequences them.
//!
//! A [`Strategy`] is one concrete fetch mechanism with a uniform
//! `(context) → StrategyResult` contract. The routing policy orders them,
//! the retry controller drives a single strategy through its attempt
//! budget, and the fallback chain advances across strategies until one
//! succeeds.

pub mod chain;
pub mod headless;
pub mod http;
pub mod manual;
pub mod retry;
pub mod session;

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Classification, ErrorKind};
use crate::utils::constants::{DEFAULT_USER_AGENT, MAX_RETRIES};

pub use chain::{DispatchFailure, DispatchOutcome, FallbackChain, StrategyExecutor, StrategySet};
pub use headless::HeadlessStrategy;
pub use http::HttpStrategy;
pub use manual::ManualStrategy;
pub use retry::run_with_retry;
pub use session::{BrowserDriver, CdpDriver, DebugSession, SessionError, TabHandle};

/// A concrete fetch mechanism.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Plain HTTP GET with lenient TLS
    Http,
    /// Long-lived headless browser debug session
    Headless,
    /// Operator-driven visible browser, DOM captured over the debug protocol
    Manual,
}

impl Strategy {
    /// The default order strategies are tried in.
    pub const DEFAULT_ORDER: [Strategy; 3] = [Strategy::Http, Strategy::Headless, Strategy::Manual];
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Http => "http",
            Self::Headless => "headless",
            Self::Manual => "manual",
        })
    }
}

impl std::str::FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "http" => Ok(Self::Http),
            "headless" => Ok(Self::Headless),
            "manual" => Ok(Self::Manual),
            other => Err(format!("unknown fetch strategy '{other}'")),
        }
    }
}

/// Immutable per-request context handed to every strategy.
#[derive(Debug, Clone)]
pub struct FetchContext {
    /// Canonicalized URL to fetch
    pub url: String,
    pub user_agent: String,
    pub timeout: Duration,
    /// Retries after the first attempt; 0 means exactly one attempt
    pub max_retries: u32,
    pub extra_headers: HashMap<String, String>,
}

impl FetchContext {
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: Duration::from_secs(30),
            max_retries: MAX_RETRIES,
            extra_headers: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    #[must_use]
    pub fn with_user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = ua.into();
        self
    }
}

/// Result of running one strategy (possibly over several attempts).
///
/// Strategies never unwind across the chain boundary; failures travel in
/// this value together with their classification.
#[derive(Debug, Clone, Default)]
pub struct StrategyResult {
    pub success: bool,
    pub html: Option<String>,
    /// URL after redirects, when known
    pub final_url: Option<String>,
    pub attempts: u32,
    pub duration: Duration,
    pub error_kind: Option<ErrorKind>,
    pub error_message: Option<String>,
    /// Classification of the terminal failure, for chain short-circuiting
    pub classification: Option<Classification>,
    /// HTTP gave up on certificate verification problems
    pub ssl_fallback_used: bool,
    /// A debug-protocol session was attached
    pub chrome_attached: bool,
    /// Body hit the page-size cap or the stream ended early
    pub truncated: bool,
    /// Charset label the body was decoded with
    pub encoding: Option<String>,
    /// Seconds spent waiting on browser rendering
    pub render_secs: f64,
}

impl StrategyResult {
    #[must_use]
    pub fn succeeded(html: String, final_url: String, attempts: u32, duration: Duration) -> Self {
        Self {
            success: true,
            html: Some(html),
            final_url: Some(final_url),
            attempts,
            duration,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn failed(
        classification: Classification,
        message: impl Into<String>,
        attempts: u32,
        duration: Duration,
    ) -> Self {
        Self {
            success: false,
            attempts,
            duration,
            error_kind: Some(classification.kind),
            error_message: Some(message.into()),
            classification: Some(classification),
            ..Self::default()
        }
    }

    /// Short "kind: message" rendering for composite error reports.
    #[must_use]
    pub fn outcome_line(&self) -> String {
        if self.success {
            "success".to_string()
        } else {
            format!(
                "{}: {}",
                self.error_kind.map_or_else(|| "unknown".to_string(), |k| k.to_string()),
                self.error_message.as_deref().unwrap_or("no detail")
            )
        }
    }
}
