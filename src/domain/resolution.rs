use std::collections::{BTreeSet, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{FeedItem, Token};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    Codec,
    Redirect,
    Browser,
    Passthrough,
    Failed,
    Skipped,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Codec => "codec",
            Strategy::Redirect => "redirect",
            Strategy::Browser => "browser",
            Strategy::Passthrough => "passthrough",
            Strategy::Failed => "failed",
            Strategy::Skipped => "skipped",
        }
    }

    /// Strategies that produced a URL for the output set.
    pub fn yields_url(&self) -> bool {
        matches!(
            self,
            Strategy::Codec | Strategy::Redirect | Strategy::Browser | Strategy::Passthrough
        )
    }

    /// Strategies that found the publisher URL, as opposed to keeping the token.
    pub fn is_publisher_url(&self) -> bool {
        matches!(self, Strategy::Codec | Strategy::Redirect | Strategy::Browser)
    }
}

impl std::str::FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "codec" => Ok(Strategy::Codec),
            "redirect" => Ok(Strategy::Redirect),
            "browser" => Ok(Strategy::Browser),
            "passthrough" => Ok(Strategy::Passthrough),
            "failed" => Ok(Strategy::Failed),
            "skipped" => Ok(Strategy::Skipped),
            _ => Err(format!("Unknown strategy: {}", s)),
        }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionResult {
    pub original_token: String,
    pub resolved_url: Option<String>,
    pub strategy: Strategy,
    pub resolved_at: DateTime<Utc>,
    /// Served from a resolution cache instead of a fresh escalation.
    #[serde(default)]
    pub cached: bool,
}

impl ResolutionResult {
    pub fn resolved(token: &Token, url: String, strategy: Strategy) -> Self {
        Self {
            original_token: token.raw().to_string(),
            resolved_url: Some(url),
            strategy,
            resolved_at: Utc::now(),
            cached: false,
        }
    }

    pub fn passthrough(token: &Token) -> Self {
        Self::resolved(token, token.raw().to_string(), Strategy::Passthrough)
    }

    pub fn failed(token: &Token) -> Self {
        Self::unresolved(token, Strategy::Failed)
    }

    pub fn skipped(token: &Token) -> Self {
        Self::unresolved(token, Strategy::Skipped)
    }

    fn unresolved(token: &Token, strategy: Strategy) -> Self {
        Self {
            original_token: token.raw().to_string(),
            resolved_url: None,
            strategy,
            resolved_at: Utc::now(),
            cached: false,
        }
    }

    pub fn as_cached(mut self) -> Self {
        self.cached = true;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyCounters {
    pub codec: usize,
    pub redirect: usize,
    pub browser: usize,
    pub passthrough: usize,
    pub failed: usize,
    pub skipped: usize,
    pub cached: usize,
}

impl StrategyCounters {
    pub fn record(&mut self, result: &ResolutionResult) {
        match result.strategy {
            Strategy::Codec => self.codec += 1,
            Strategy::Redirect => self.redirect += 1,
            Strategy::Browser => self.browser += 1,
            Strategy::Passthrough => self.passthrough += 1,
            Strategy::Failed => self.failed += 1,
            Strategy::Skipped => self.skipped += 1,
        }
        if result.cached {
            self.cached += 1;
        }
    }

    /// Tokens recorded; cache hits are already counted under their strategy.
    pub fn total(&self) -> usize {
        self.codec + self.redirect + self.browser + self.passthrough + self.failed + self.skipped
    }
}

impl std::fmt::Display for StrategyCounters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "codec={} redirect={} browser={} passthrough={} failed={} skipped={} cached={}",
            self.codec,
            self.redirect,
            self.browser,
            self.passthrough,
            self.failed,
            self.skipped,
            self.cached
        )
    }
}

/// Record shape expected by the downstream deduplication and classification stages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleRecord {
    pub url: String,
    pub date: Option<String>,
    pub title: String,
    pub source: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolutionBatch {
    tokens: Vec<Token>,
    /// One result per input token, in input order.
    results: Vec<ResolutionResult>,
    resolved_urls: BTreeSet<String>,
    counters: StrategyCounters,
}

impl ResolutionBatch {
    /// Build a batch from input-ordered results.
    ///
    /// `results[i]` must describe `tokens[i]`.
    pub fn from_results(tokens: Vec<Token>, results: Vec<ResolutionResult>) -> Self {
        debug_assert_eq!(tokens.len(), results.len());

        let mut counters = StrategyCounters::default();
        let mut resolved_urls = BTreeSet::new();

        for result in &results {
            counters.record(result);
            if result.strategy.yields_url() {
                if let Some(url) = &result.resolved_url {
                    resolved_urls.insert(url.clone());
                }
            }
        }

        Self {
            tokens,
            results,
            resolved_urls,
            counters,
        }
    }

    /// Index-correlated results: `results()[i]` belongs to the i-th input token.
    pub fn results(&self) -> &[ResolutionResult] {
        &self.results
    }

    /// Deduplicated output set. Ordering carries no meaning.
    pub fn resolved_urls(&self) -> &BTreeSet<String> {
        &self.resolved_urls
    }

    pub fn counters(&self) -> &StrategyCounters {
        &self.counters
    }

    pub fn contains(&self, url: &str) -> bool {
        self.resolved_urls.contains(url)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// True when nothing could be confidently resolved.
    pub fn is_empty(&self) -> bool {
        self.resolved_urls.is_empty()
    }

    /// Re-attach feed metadata by position, keeping the first record per URL.
    ///
    /// `items[i]` must be the item whose token was the i-th input token.
    pub fn records(&self, items: &[FeedItem]) -> Vec<ArticleRecord> {
        let mut seen = HashSet::new();

        self.results
            .iter()
            .zip(items)
            .filter(|(result, _)| result.strategy.yields_url())
            .filter_map(|(result, item)| {
                let url = result.resolved_url.clone()?;
                if !seen.insert(url.clone()) {
                    return None;
                }
                Some(ArticleRecord {
                    url,
                    date: item.published.clone(),
                    title: item.title.clone(),
                    source: item.source.clone(),
                })
            })
            .collect()
    }
}
