//! Consent-interstitial state machine for a single browser visit.

use std::time::Duration;

use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, info, warn};

use crate::domain::aggregator::is_off_aggregator;
use crate::domain::ConsentState;
use crate::errors::{ResolverError, ResolverResult};
use crate::resolvers::traits::PageDriver;

const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct ConsentSettings {
    /// How long to look for an accept-cookies control after the first navigation.
    pub consent_window: Duration,
    pub poll_interval: Duration,
}

impl Default for ConsentSettings {
    fn default() -> Self {
        Self {
            consent_window: Duration::from_secs(5),
            poll_interval: Duration::from_millis(500),
        }
    }
}

/// One visit through the interstitial. Owns its page and always closes it.
pub struct ConsentSession<D: PageDriver> {
    driver: D,
    settings: ConsentSettings,
    history: Vec<ConsentState>,
}

impl<D: PageDriver> ConsentSession<D> {
    pub fn new(driver: D, settings: ConsentSettings) -> Self {
        Self {
            driver,
            settings,
            history: vec![ConsentState::Navigating],
        }
    }

    pub fn state(&self) -> ConsentState {
        self.history
            .last()
            .copied()
            .unwrap_or(ConsentState::Navigating)
    }

    /// Every state visited, in order.
    pub fn history(&self) -> &[ConsentState] {
        &self.history
    }

    /// Terminal states absorb every later transition.
    fn transition(&mut self, next: ConsentState) {
        let current = self.state();
        if current == next || current.is_terminal() {
            return;
        }
        debug_assert!(
            current.can_transition_to(next),
            "illegal consent transition {} -> {}",
            current,
            next
        );
        debug!(from = %current, to = %next, "Consent session transition");
        self.history.push(next);
    }

    /// Navigate to `url` and return the off-aggregator address the tab settles on.
    ///
    /// The page is closed on every exit path. Expiry of `limit` ends in
    /// [`ConsentState::TimedOut`] and a `ConsentTimeout` error.
    pub async fn run(&mut self, url: &str, limit: Duration) -> ResolverResult<String> {
        let visit = timeout(limit, self.drive(url)).await;
        let outcome = match visit {
            Ok(Ok(settled)) => Ok(settled),
            Ok(Err(e)) => {
                warn!(url, state = %self.state(), error = %e, "Browser visit failed");
                self.transition(ConsentState::TimedOut);
                Err(e)
            }
            Err(_) => {
                info!(url, state = %self.state(), timeout_ms = limit.as_millis() as u64, "Browser visit timed out");
                self.transition(ConsentState::TimedOut);
                Err(ResolverError::ConsentTimeout(url.to_string()))
            }
        };

        match timeout(CLOSE_TIMEOUT, self.driver.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(url, error = %e, "Failed to close browser page"),
            Err(_) => warn!(url, "Closing browser page timed out"),
        }

        outcome
    }

    async fn drive(&mut self, url: &str) -> ResolverResult<String> {
        self.driver.goto(url).await?;

        let window_end = Instant::now() + self.settings.consent_window;
        while self.state() == ConsentState::Navigating {
            if let Some(settled) = self.settled_url().await? {
                return Ok(settled);
            }
            if self.driver.has_consent_control().await? {
                self.transition(ConsentState::ConsentPresented);
                if self.driver.accept_consent().await? {
                    self.transition(ConsentState::ConsentAccepted);
                }
                break;
            }
            if Instant::now() >= window_end {
                break;
            }
            sleep(self.settings.poll_interval).await;
        }

        loop {
            if let Some(settled) = self.settled_url().await? {
                return Ok(settled);
            }
            if self.state() == ConsentState::ConsentPresented && self.driver.accept_consent().await? {
                self.transition(ConsentState::ConsentAccepted);
            }
            sleep(self.settings.poll_interval).await;
        }
    }

    async fn settled_url(&mut self) -> ResolverResult<Option<String>> {
        match self.driver.current_url().await? {
            Some(current) if is_off_aggregator(&current) => {
                self.transition(ConsentState::Settled);
                Ok(Some(current))
            }
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolvers::traits::MockPageDriver;

    const TOKEN_URL: &str = "https://news.google.com/rss/articles/CBMiXYZ?oc=5";
    const CONSENT_URL: &str = "https://consent.google.com/ml?continue=https://news.google.com";
    const ARTICLE_URL: &str = "https://example.com/story";

    fn fast_settings() -> ConsentSettings {
        ConsentSettings {
            consent_window: Duration::from_millis(200),
            poll_interval: Duration::from_millis(50),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_direct_redirect_settles_without_consent() {
        let mut driver = MockPageDriver::new();
        driver.expect_goto().times(1).returning(|_| Ok(()));
        driver
            .expect_current_url()
            .returning(|| Ok(Some(ARTICLE_URL.to_string())));
        driver.expect_has_consent_control().never();
        driver.expect_close().times(1).returning(|| Ok(()));

        let mut session = ConsentSession::new(driver, fast_settings());
        let settled = session.run(TOKEN_URL, Duration::from_secs(5)).await.unwrap();

        assert_eq!(settled, ARTICLE_URL);
        assert_eq!(
            session.history(),
            &[ConsentState::Navigating, ConsentState::Settled]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_consent_accepted_then_settled() {
        let mut driver = MockPageDriver::new();
        driver.expect_goto().times(1).returning(|_| Ok(()));
        let mut url_reads = 0;
        driver.expect_current_url().times(2).returning(move || {
            url_reads += 1;
            if url_reads == 1 {
                Ok(Some(CONSENT_URL.to_string()))
            } else {
                Ok(Some(format!("{}?utm_source=gn", ARTICLE_URL)))
            }
        });
        driver
            .expect_has_consent_control()
            .times(1)
            .returning(|| Ok(true));
        driver
            .expect_accept_consent()
            .times(1)
            .returning(|| Ok(true));
        driver.expect_close().times(1).returning(|| Ok(()));

        let mut session = ConsentSession::new(driver, fast_settings());
        let settled = session.run(TOKEN_URL, Duration::from_secs(5)).await.unwrap();

        assert_eq!(settled, format!("{}?utm_source=gn", ARTICLE_URL));
        assert_eq!(
            session.history(),
            &[
                ConsentState::Navigating,
                ConsentState::ConsentPresented,
                ConsentState::ConsentAccepted,
                ConsentState::Settled,
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_stuck_on_aggregator_times_out_and_closes() {
        let mut driver = MockPageDriver::new();
        driver.expect_goto().returning(|_| Ok(()));
        driver
            .expect_current_url()
            .returning(|| Ok(Some(TOKEN_URL.to_string())));
        driver.expect_has_consent_control().returning(|| Ok(false));
        driver.expect_close().times(1).returning(|| Ok(()));

        let mut session = ConsentSession::new(driver, fast_settings());
        let result = session.run(TOKEN_URL, Duration::from_secs(2)).await;

        assert!(matches!(result, Err(ResolverError::ConsentTimeout(_))));
        assert_eq!(session.state(), ConsentState::TimedOut);
    }

    #[tokio::test(start_paused = true)]
    async fn test_consent_click_failing_times_out() {
        let mut driver = MockPageDriver::new();
        driver.expect_goto().returning(|_| Ok(()));
        driver
            .expect_current_url()
            .returning(|| Ok(Some(CONSENT_URL.to_string())));
        driver.expect_has_consent_control().returning(|| Ok(true));
        driver.expect_accept_consent().returning(|| Ok(false));
        driver.expect_close().times(1).returning(|| Ok(()));

        let mut session = ConsentSession::new(driver, fast_settings());
        let result = session.run(TOKEN_URL, Duration::from_secs(1)).await;

        assert!(result.is_err());
        assert_eq!(
            session.history(),
            &[
                ConsentState::Navigating,
                ConsentState::ConsentPresented,
                ConsentState::TimedOut,
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_navigation_error_still_closes() {
        let mut driver = MockPageDriver::new();
        driver
            .expect_goto()
            .returning(|_| Err(ResolverError::Browser("net::ERR_NAME_NOT_RESOLVED".into())));
        driver.expect_close().times(1).returning(|| Ok(()));

        let mut session = ConsentSession::new(driver, fast_settings());
        let result = session.run(TOKEN_URL, Duration::from_secs(5)).await;

        assert!(matches!(result, Err(ResolverError::Browser(_))));
        assert_eq!(session.state(), ConsentState::TimedOut);
    }

    #[test]
    fn test_terminal_state_absorbs_transitions() {
        let mut session = ConsentSession::new(MockPageDriver::new(), fast_settings());

        session.transition(ConsentState::Settled);
        session.transition(ConsentState::TimedOut);

        assert_eq!(session.state(), ConsentState::Settled);
        assert_eq!(
            session.history(),
            &[ConsentState::Navigating, ConsentState::Settled]
        );
    }
}
