use std::time::Duration;

use async_trait::async_trait;
use reqwest::{redirect::Policy, Client};
use tracing::{debug, warn};

use crate::domain::aggregator::{is_off_aggregator, strip_tracking};
use crate::domain::Token;
use crate::errors::{ResolverError, ResolverResult};
use crate::resolvers::traits::RedirectResolver;

/// Browser-like agent; the aggregator answers bare clients with an error page.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

#[derive(Debug, Clone)]
pub struct RedirectSettings {
    pub request_timeout: Duration,
    pub attempts: u32,
    pub backoff: Duration,
    pub redirect_limit: usize,
    pub user_agent: String,
}

impl Default for RedirectSettings {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(15),
            attempts: 2,
            backoff: Duration::from_secs(2),
            redirect_limit: 10,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

pub struct HttpRedirectResolver {
    client: Client,
    settings: RedirectSettings,
}

impl HttpRedirectResolver {
    pub fn new(settings: RedirectSettings) -> Self {
        let client = Client::builder()
            .timeout(settings.request_timeout)
            .redirect(Policy::limited(settings.redirect_limit))
            .user_agent(settings.user_agent.clone())
            .build()
            .unwrap_or_else(|_| Client::new());

        Self { client, settings }
    }

    /// One GET; returns the URL the redirect chain ended on.
    async fn final_url(&self, url: &str) -> ResolverResult<String> {
        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                ResolverError::NetworkTimeout(url.to_string())
            } else {
                ResolverError::Network(e.to_string())
            }
        })?;

        Ok(response.url().to_string())
    }

    fn accept_landing(input: &str, landing: &str) -> Option<String> {
        if landing == input {
            return None;
        }
        if !is_off_aggregator(landing) {
            // Still on the aggregator: an interstitial, not the article.
            return None;
        }
        Some(strip_tracking(landing))
    }
}

impl Default for HttpRedirectResolver {
    fn default() -> Self {
        Self::new(RedirectSettings::default())
    }
}

#[async_trait]
impl RedirectResolver for HttpRedirectResolver {
    async fn resolve(&self, token: &Token) -> Option<String> {
        let input = token.raw();
        let attempts = self.settings.attempts.max(1);

        for attempt in 1..=attempts {
            match self.final_url(input).await {
                Ok(landing) => {
                    let accepted = Self::accept_landing(input, &landing);
                    debug!(token = input, landing = %landing, accepted = accepted.is_some(), "Redirect chain finished");
                    return accepted;
                }
                Err(e) if e.is_retriable() && attempt < attempts => {
                    warn!(token = input, attempt, error = %e, "Redirect request timed out, retrying");
                    tokio::time::sleep(self.settings.backoff).await;
                }
                Err(e) => {
                    debug!(token = input, attempt, error = %e, "Redirect strategy gave up");
                    return None;
                }
            }
        }

        None
    }
}
