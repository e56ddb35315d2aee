//! Routing policy: which strategies to try for a URL, in what order.
//!
//! The default order is HTTP, then the headless browser, then the
//! operator-driven manual strategy. Two inputs override the head of the
//! list: a file of SSL-problematic domain suffixes (HTTP is skipped
//! entirely for those), and an optional YAML rule set where the
//! highest-priority matching rule names the first strategy.
//!
//! The policy only proposes an order; the fallback chain decides what
//! actually runs.

use std::path::Path;

use anyhow::{Context, Result};
use log::{debug, info, warn};
use regex::Regex;
use serde::Deserialize;

use crate::fetch::Strategy;

/// One routing rule as written in the YAML file.
#[derive(Debug, Deserialize)]
struct RawRule {
    name: String,
    priority: i32,
    #[serde(rename = "match")]
    matcher: RawMatcher,
    fetcher: Strategy,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum RawMatcher {
    /// Domain suffix match ("example.com" matches sub.example.com)
    Domain(String),
    /// Regular expression over the full URL
    Regex(String),
    /// Exact URL string
    Literal(String),
}

#[derive(Debug)]
enum Matcher {
    Domain(String),
    Regex(Regex),
    Literal(String),
}

#[derive(Debug)]
struct Rule {
    name: String,
    priority: i32,
    matcher: Matcher,
    fetcher: Strategy,
}

impl Rule {
    fn matches(&self, url: &str, host: &str) -> bool {
        match &self.matcher {
            Matcher::Domain(suffix) => domain_matches(host, suffix),
            Matcher::Regex(re) => re.is_match(url),
            Matcher::Literal(lit) => url == lit,
        }
    }
}

/// Immutable routing policy, built once at startup.
#[derive(Debug, Default)]
pub struct RoutingPolicy {
    ssl_problem_domains: Vec<String>,
    rules: Vec<Rule>,
}

impl RoutingPolicy {
    /// Load the policy from its two optional inputs. Missing inputs leave
    /// the default behavior intact.
    pub fn load(ssl_domains: Option<&Path>, rules: Option<&Path>) -> Result<Self> {
        let mut policy = Self::default();
        if let Some(path) = ssl_domains {
            policy.ssl_problem_domains = load_ssl_domains(path)?;
            info!(
                "loaded {} SSL-problematic domain(s) from {}",
                policy.ssl_problem_domains.len(),
                path.display()
            );
        }
        if let Some(path) = rules {
            policy.rules = load_rules(path)?;
            info!("loaded {} routing rule(s) from {}", policy.rules.len(), path.display());
        }
        Ok(policy)
    }

    #[must_use]
    pub fn with_ssl_domains(mut self, domains: Vec<String>) -> Self {
        self.ssl_problem_domains = domains;
        self
    }

    /// Ordered strategy list for a URL.
    #[must_use]
    pub fn strategies_for(&self, url: &str) -> Vec<Strategy> {
        let host = host_of(url);

        // SSL-problematic domains never get plain HTTP
        if self
            .ssl_problem_domains
            .iter()
            .any(|d| domain_matches(&host, d))
        {
            info!("routing {url}: SSL-problematic domain, skipping HTTP");
            return vec![Strategy::Headless, Strategy::Manual];
        }

        let chosen = self
            .rules
            .iter()
            .filter(|r| r.matches(url, &host))
            .max_by_key(|r| r.priority);

        let order = match chosen {
            Some(rule) => {
                info!(
                    "routing {url}: rule '{}' (priority {}) selects {}",
                    rule.name, rule.priority, rule.fetcher
                );
                let mut order = vec![rule.fetcher];
                order.extend(
                    Strategy::DEFAULT_ORDER
                        .iter()
                        .copied()
                        .filter(|s| *s != rule.fetcher),
                );
                order
            }
            None => {
                debug!("routing {url}: default strategy order");
                Strategy::DEFAULT_ORDER.to_vec()
            }
        };
        order
    }
}

/// Domain suffix test with a `www.` allowance on the host side.
fn domain_matches(host: &str, suffix: &str) -> bool {
    let host = host.strip_prefix("www.").unwrap_or(host);
    let suffix = suffix.trim();
    if suffix.is_empty() {
        return false;
    }
    host == suffix || host.ends_with(&format!(".{suffix}"))
}

fn host_of(url: &str) -> String {
    url.split("://")
        .nth(1)
        .unwrap_or(url)
        .split(['/', '?', '#'])
        .next()
        .unwrap_or("")
        .split('@')
        .next_back()
        .unwrap_or("")
        .split(':')
        .next()
        .unwrap_or("")
        .to_lowercase()
}

fn load_ssl_domains(path: &Path) -> Result<Vec<String>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read SSL domain list {}", path.display()))?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_lowercase)
        .collect())
}

fn load_rules(path: &Path) -> Result<Vec<Rule>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read routing rules {}", path.display()))?;
    let raw: Vec<RawRule> =
        serde_yaml::from_str(&text).with_context(|| format!("invalid routing rules in {}", path.display()))?;

    let mut rules = Vec::with_capacity(raw.len());
    for r in raw {
        let matcher = match r.matcher {
            RawMatcher::Domain(d) => Matcher::Domain(d.to_lowercase()),
            RawMatcher::Regex(pattern) => match Regex::new(&pattern) {
                Ok(re) => Matcher::Regex(re),
                Err(e) => {
                    warn!("skipping routing rule '{}': bad regex: {e}", r.name);
                    continue;
                }
            },
            RawMatcher::Literal(l) => Matcher::Literal(l),
        };
        rules.push(Rule {
            name: r.name,
            priority: r.priority,
            matcher,
            fetcher: r.fetcher,
        });
    }
    Ok(rules)
}
