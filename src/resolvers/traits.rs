use std::time::Duration;

use async_trait::async_trait;

use crate::domain::Token;
use crate::errors::ResolverResult;

/// Network strategy: follow the aggregator's HTTP redirects.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RedirectResolver: Send + Sync {
    /// The off-aggregator landing URL, or `None` when the chain stays on the
    /// aggregator or the request keeps timing out.
    async fn resolve(&self, token: &Token) -> Option<String>;
}

/// Headless-browser strategy, the most expensive rung of the escalation chain.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BrowserNavigator: Send + Sync {
    /// Cleaned publisher URLs reached from the token, empty when the visit
    /// settled on the aggregator. Errors mean the token family cannot be
    /// browsed or the browser cannot start at all.
    async fn resolve_via_browser(&self, token: &Token, timeout: Duration)
        -> ResolverResult<Vec<String>>;
}

/// Page operations the consent state machine needs from a browser tab.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PageDriver: Send {
    async fn goto(&mut self, url: &str) -> ResolverResult<()>;

    /// The address currently shown by the tab.
    async fn current_url(&mut self) -> ResolverResult<Option<String>>;

    /// Whether an accept-cookies control is currently on the page.
    async fn has_consent_control(&mut self) -> ResolverResult<bool>;

    /// Click the accept-cookies control and wait for the navigation it triggers.
    /// Returns whether a control was found and clicked.
    async fn accept_consent(&mut self) -> ResolverResult<bool>;

    /// Release the tab and its browsing context.
    async fn close(&mut self) -> ResolverResult<()>;
}
