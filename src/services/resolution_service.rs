use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt, TryStreamExt};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::codec;
use crate::domain::{
    ArticleRecord, FeedItem, ResolutionBatch, ResolutionResult, Strategy, Token, TokenOrigin,
};
use crate::errors::{ResolverError, ResolverResult};
use crate::resolvers::traits::{BrowserNavigator, RedirectResolver};
use crate::storage::traits::ResolutionCache;

/// Extra time granted past the navigation timeout for launching and tearing
/// down the browser before the visit is abandoned.
const BROWSER_GRACE: Duration = Duration::from_secs(15);

#[derive(Debug, Clone)]
pub struct ResolveOptions {
    /// Tokens escalated at the same time.
    pub concurrency: usize,
    /// Browser timeout for directly scraped tokens.
    pub timeout: Duration,
    /// Browser timeout for feed-article tokens.
    pub feed_timeout: Duration,
    pub enable_browser_fallback: bool,
    pub browser_concurrency: usize,
    /// Pause after this many browser visits; 0 disables pacing.
    pub cooldown_every: usize,
    pub cooldown: Duration,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            concurrency: 1,
            timeout: Duration::from_secs(30),
            feed_timeout: Duration::from_secs(45),
            enable_browser_fallback: true,
            browser_concurrency: 1,
            cooldown_every: 10,
            cooldown: Duration::from_secs(5),
        }
    }
}

impl ResolveOptions {
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_browser_fallback(mut self, enabled: bool) -> Self {
        self.enable_browser_fallback = enabled;
        self
    }

    fn browser_timeout(&self, origin: TokenOrigin) -> Duration {
        match origin {
            TokenOrigin::Feed => self.feed_timeout,
            TokenOrigin::Scraped => self.timeout,
        }
    }
}

/// Escalates tokens through codec, redirect and browser strategies.
pub struct ResolutionService {
    redirect: Arc<dyn RedirectResolver>,
    browser: Option<Arc<dyn BrowserNavigator>>,
    cache: Option<Arc<dyn ResolutionCache>>,
    browser_visits: AtomicUsize,
}

impl ResolutionService {
    pub fn new(redirect: Arc<dyn RedirectResolver>) -> Self {
        Self {
            redirect,
            browser: None,
            cache: None,
            browser_visits: AtomicUsize::new(0),
        }
    }

    pub fn with_browser(mut self, browser: Arc<dyn BrowserNavigator>) -> Self {
        self.browser = Some(browser);
        self
    }

    pub fn with_cache(mut self, cache: Arc<dyn ResolutionCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Browser visits made over the lifetime of this service.
    pub fn browser_visits(&self) -> usize {
        self.browser_visits.load(Ordering::SeqCst)
    }

    /// Resolve every token. Only a systemic error fails the batch; per-token
    /// failures are recorded as `failed` results.
    pub async fn resolve_batch(
        &self,
        tokens: Vec<Token>,
        opts: &ResolveOptions,
    ) -> ResolverResult<ResolutionBatch> {
        let entries: Vec<(&Token, Option<&str>)> = tokens.iter().map(|t| (t, None)).collect();
        let results = self.resolve_entries(&entries, opts).await?;

        let batch = ResolutionBatch::from_results(tokens, results);
        info!(tokens = batch.len(), resolved = batch.resolved_urls().len(), counters = %batch.counters(), "Batch resolved");
        Ok(batch)
    }

    /// Resolve feed items, reusing their pre-decoded URLs, and re-attach
    /// their metadata to the resolved URLs.
    pub async fn resolve_items(
        &self,
        items: &[FeedItem],
        opts: &ResolveOptions,
    ) -> ResolverResult<Vec<ArticleRecord>> {
        let entries: Vec<(&Token, Option<&str>)> = items
            .iter()
            .map(|item| (&item.token, item.decoded.as_deref()))
            .collect();
        let results = self.resolve_entries(&entries, opts).await?;

        let tokens = items.iter().map(|item| item.token.clone()).collect();
        let batch = ResolutionBatch::from_results(tokens, results);
        info!(items = items.len(), resolved = batch.resolved_urls().len(), counters = %batch.counters(), "Feed items resolved");

        Ok(batch.records(items))
    }

    /// Input-ordered results for `entries`.
    async fn resolve_entries(
        &self,
        entries: &[(&Token, Option<&str>)],
        opts: &ResolveOptions,
    ) -> ResolverResult<Vec<ResolutionResult>> {
        let gate = Semaphore::new(opts.browser_concurrency.max(1));

        let mut indexed: Vec<(usize, ResolutionResult)> = stream::iter(entries.iter().enumerate())
            .map(|(index, (token, predecoded))| {
                let gate = &gate;
                async move {
                    self.resolve_one(token, *predecoded, opts, gate)
                        .await
                        .map(|result| (index, result))
                }
            })
            .buffer_unordered(opts.concurrency.max(1))
            .try_collect()
            .await?;

        indexed.sort_by_key(|(index, _)| *index);
        Ok(indexed.into_iter().map(|(_, result)| result).collect())
    }

    async fn resolve_one(
        &self,
        token: &Token,
        predecoded: Option<&str>,
        opts: &ResolveOptions,
        gate: &Semaphore,
    ) -> ResolverResult<ResolutionResult> {
        if token.is_story_cluster() {
            debug!(token = token.raw(), "Skipping story cluster");
            return Ok(ResolutionResult::skipped(token));
        }

        if let Some(cache) = &self.cache {
            if let Some(hit) = cache.get(token.raw()) {
                debug!(token = token.raw(), strategy = %hit.strategy, "Cache hit");
                return Ok(hit.as_cached());
            }
        }

        let result = self.escalate(token, predecoded, opts, gate).await?;

        if let Some(cache) = &self.cache {
            cache.put(&result);
        }

        Ok(result)
    }

    async fn escalate(
        &self,
        token: &Token,
        predecoded: Option<&str>,
        opts: &ResolveOptions,
        gate: &Semaphore,
    ) -> ResolverResult<ResolutionResult> {
        let decoded = predecoded
            .map(str::to_string)
            .or_else(|| codec::decode(token.raw()));
        if let Some(url) = decoded {
            debug!(token = token.raw(), url = %url, "Resolved offline");
            return Ok(ResolutionResult::resolved(token, url, Strategy::Codec));
        }

        // Network strategies only make sense for aggregator tokens.
        if token.family().is_some() {
            if let Some(url) = self.redirect.resolve(token).await {
                debug!(token = token.raw(), url = %url, "Resolved via redirect");
                return Ok(ResolutionResult::resolved(token, url, Strategy::Redirect));
            }

            if let Some(url) = self.browse(token, opts, gate).await? {
                debug!(token = token.raw(), url = %url, "Resolved via browser");
                return Ok(ResolutionResult::resolved(token, url, Strategy::Browser));
            }
        }

        if token.is_long() {
            info!(token_len = token.raw().len(), "Keeping unresolved long token");
            Ok(ResolutionResult::passthrough(token))
        } else {
            warn!(token = token.raw(), "Token could not be resolved");
            Ok(ResolutionResult::failed(token))
        }
    }

    /// Browser rung. `Ok(None)` on any per-token failure; only systemic
    /// errors propagate.
    async fn browse(
        &self,
        token: &Token,
        opts: &ResolveOptions,
        gate: &Semaphore,
    ) -> ResolverResult<Option<String>> {
        let navigator = match &self.browser {
            Some(navigator) if opts.enable_browser_fallback => navigator,
            _ => return Ok(None),
        };

        let _permit = gate
            .acquire()
            .await
            .map_err(|e| ResolverError::Browser(format!("browser gate closed: {}", e)))?;

        let timeout = opts.browser_timeout(token.origin());
        let visit = navigator.resolve_via_browser(token, timeout);
        let outcome = tokio::time::timeout(timeout + BROWSER_GRACE, visit).await;

        let visits = self.browser_visits.fetch_add(1, Ordering::SeqCst) + 1;

        let url = match outcome {
            Ok(Ok(urls)) => urls.into_iter().next(),
            Ok(Err(e)) if e.is_systemic() => return Err(e),
            Ok(Err(e)) => {
                warn!(token = token.raw(), error = %e, "Browser visit failed");
                None
            }
            Err(_) => {
                warn!(token = token.raw(), timeout_secs = timeout.as_secs(), "Browser visit abandoned");
                None
            }
        };

        if opts.cooldown_every > 0 && visits % opts.cooldown_every == 0 {
            info!(visits, cooldown_secs = opts.cooldown.as_secs(), "Browser cooldown");
            tokio::time::sleep(opts.cooldown).await;
        }

        Ok(url)
    }
}
