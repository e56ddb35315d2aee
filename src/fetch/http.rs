//! Plain-HTTP fetch strategy.
//!
//! One GET per attempt with lenient TLS (legacy government servers ship
//! broken chains), an explicit User-Agent and Accept-Language, automatic
//! redirect following with the final URL recorded, and a hard read cap of
//! `MAX_PAGE_SIZE`. Interrupted bodies are kept and flagged truncated
//! rather than discarded. Decoding goes through the charset detector.

use futures_util::StreamExt;
use log::warn;
use reqwest::header::{ACCEPT_LANGUAGE, CONTENT_TYPE, USER_AGENT};
use reqwest::redirect::Policy;

use crate::encoding::decode_html;
use crate::error::{classify_reqwest, classify_status, looks_like_anti_bot, Classification, ErrorKind};
use crate::fetch::retry::{run_with_retry, Attempt, AttemptError};
use crate::fetch::{FetchContext, StrategyResult};
use crate::utils::constants::{DEFAULT_ACCEPT_LANGUAGE, MAX_PAGE_SIZE};

pub struct HttpStrategy {
    client: reqwest::Client,
}

impl HttpStrategy {
    /// Build the strategy with its own lenient-TLS client.
    pub fn new() -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .redirect(Policy::limited(10))
            .build()?;
        Ok(Self { client })
    }

    /// Fetch with the full retry budget of the context.
    pub async fn fetch(&self, ctx: &FetchContext) -> StrategyResult {
        run_with_retry(ctx, |_| self.attempt(ctx)).await
    }

    async fn attempt(&self, ctx: &FetchContext) -> Result<Attempt, AttemptError> {
        let mut request = self
            .client
            .get(&ctx.url)
            .header(USER_AGENT, &ctx.user_agent)
            .header(ACCEPT_LANGUAGE, DEFAULT_ACCEPT_LANGUAGE)
            .timeout(ctx.timeout);
        for (name, value) in &ctx.extra_headers {
            request = request.header(name, value);
        }

        let response = request.send().await.map_err(|e| {
            let classification = classify_reqwest(&e);
            AttemptError::new(classification, e.to_string())
        })?;

        let status = response.status();
        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        if !status.is_success() {
            return Err(AttemptError::new(
                classify_status(status.as_u16()),
                format!("HTTP {status} for {final_url}"),
            ));
        }

        let (bytes, truncated) = read_capped(response, &ctx.url).await;
        let decoded = decode_html(&bytes, content_type.as_deref());

        // A 200 can still be a bot wall; let the chain jump to a browser
        if looks_like_anti_bot(&decoded.text) {
            return Err(AttemptError::new(
                Classification {
                    kind: ErrorKind::AntiBot,
                    should_retry: false,
                    recommended_wait: None,
                    suggested_fallback: Some(crate::fetch::Strategy::Headless),
                },
                format!("anti-bot interstitial served for {final_url}"),
            ));
        }

        Ok(Attempt {
            html: decoded.text,
            final_url,
            truncated,
            encoding: Some(decoded.encoding),
            ssl_fallback_used: false,
            chrome_attached: false,
            render_secs: 0.0,
        })
    }
}

/// Drain the body up to `MAX_PAGE_SIZE` bytes.
///
/// Stream errors mid-body are not fatal: whatever arrived is returned and
/// the result is marked truncated, matching the contract that oversized
/// or interrupted responses are degraded, never rejected.
async fn read_capped(response: reqwest::Response, url: &str) -> (Vec<u8>, bool) {
    let mut bytes: Vec<u8> = Vec::with_capacity(64 * 1024);
    let mut truncated = false;
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        match chunk {
            Ok(chunk) => {
                let room = MAX_PAGE_SIZE - bytes.len();
                if chunk.len() >= room {
                    bytes.extend_from_slice(&chunk[..room]);
                    if chunk.len() > room || stream.next().await.is_some() {
                        truncated = true;
                        warn!("page truncated at {MAX_PAGE_SIZE} bytes: {url}");
                    }
                    break;
                }
                bytes.extend_from_slice(&chunk);
            }
            Err(e) => {
                warn!("incomplete read for {url}, keeping {} bytes: {e}", bytes.len());
                truncated = true;
                break;
            }
        }
    }
    (bytes, truncated)
}
