use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use tempfile::TempDir;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::domain::aggregator::{is_off_aggregator, strip_tracking};
use crate::domain::Token;
use crate::errors::{ResolverError, ResolverResult};
use crate::resolvers::consent::{ConsentSession, ConsentSettings};
use crate::resolvers::redirect::DEFAULT_USER_AGENT;
use crate::resolvers::traits::{BrowserNavigator, PageDriver};

const CHROME_CANDIDATES: &[&str] = &[
    "/usr/bin/google-chrome",
    "/usr/bin/google-chrome-stable",
    "/usr/bin/chromium",
    "/usr/bin/chromium-browser",
    "/snap/bin/chromium",
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
];

/// Button labels of the consent interstitial across the locales the aggregator serves.
const CONSENT_LABELS: &[&str] = &[
    "accept all",
    "alle akzeptieren",
    "tout accepter",
    "aceptar todo",
    "accetta tutto",
    "alles accepteren",
    "aceitar tudo",
    "zaakceptuj wszystko",
    "i agree",
];

#[derive(Debug, Clone)]
pub struct BrowserSettings {
    pub chrome_bin: Option<PathBuf>,
    pub headless: bool,
    pub launch_timeout: Duration,
    pub user_agent: String,
    pub consent: ConsentSettings,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            chrome_bin: None,
            headless: true,
            launch_timeout: Duration::from_secs(20),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            consent: ConsentSettings::default(),
        }
    }
}

/// Launches a throwaway Chromium per token so no cookies or consent state
/// carry over between visits.
pub struct ChromeNavigator {
    settings: BrowserSettings,
    live_sessions: Arc<AtomicUsize>,
}

impl ChromeNavigator {
    pub fn new(settings: BrowserSettings) -> Self {
        Self {
            settings,
            live_sessions: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of browser processes currently open.
    pub fn live_sessions(&self) -> usize {
        self.live_sessions.load(Ordering::SeqCst)
    }

    /// Locate a Chrome/Chromium binary: explicit path, then `CHROME_BIN`,
    /// then well-known install locations.
    pub fn find_chrome_binary(explicit: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return path.is_file().then(|| path.to_path_buf());
        }

        if let Ok(path) = std::env::var("CHROME_BIN") {
            let path = PathBuf::from(path);
            if path.is_file() {
                return Some(path);
            }
        }

        CHROME_CANDIDATES
            .iter()
            .map(PathBuf::from)
            .find(|path| path.is_file())
    }

    fn launch_args(&self) -> Vec<String> {
        let mut args = vec![
            "--disable-dev-shm-usage".to_string(),
            "--disable-gpu".to_string(),
            "--disable-extensions".to_string(),
            "--disable-sync".to_string(),
            "--no-first-run".to_string(),
            "--mute-audio".to_string(),
            format!("--user-agent={}", self.settings.user_agent),
        ];
        if std::env::var("CI").is_ok() || std::env::var("NO_SANDBOX").is_ok() {
            args.push("--no-sandbox".to_string());
        }
        args
    }

    async fn launch(&self) -> ResolverResult<ChromeSession> {
        let binary = Self::find_chrome_binary(self.settings.chrome_bin.as_deref())
            .ok_or_else(|| ResolverError::BrowserUnavailable("no Chrome/Chromium binary found".into()))?;

        let profile = tempfile::tempdir()?;

        let mut builder = BrowserConfig::builder()
            .chrome_executable(&binary)
            .user_data_dir(profile.path())
            .args(self.launch_args());
        if !self.settings.headless {
            builder = builder.with_head();
        }
        let config = builder
            .build()
            .map_err(|e| ResolverError::BrowserUnavailable(format!("browser config: {}", e)))?;

        debug!(binary = %binary.display(), "Launching browser");
        let (browser, mut handler) =
            match tokio::time::timeout(self.settings.launch_timeout, Browser::launch(config)).await {
                Ok(Ok(launched)) => launched,
                Ok(Err(e)) => return Err(ResolverError::BrowserUnavailable(e.to_string())),
                Err(_) => return Err(ResolverError::Browser("browser launch timed out".into())),
            };

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        self.live_sessions.fetch_add(1, Ordering::SeqCst);

        Ok(ChromeSession {
            browser,
            page: None,
            handler_task,
            profile: Some(profile),
            live_sessions: Arc::clone(&self.live_sessions),
            closed: false,
        })
    }
}

impl Default for ChromeNavigator {
    fn default() -> Self {
        Self::new(BrowserSettings::default())
    }
}

#[async_trait]
impl BrowserNavigator for ChromeNavigator {
    async fn resolve_via_browser(
        &self,
        token: &Token,
        timeout: Duration,
    ) -> ResolverResult<Vec<String>> {
        if token.is_story_cluster() {
            return Err(ResolverError::UnresolvableFamily(token.raw().to_string()));
        }

        let session = self.launch().await?;
        let mut consent = ConsentSession::new(session, self.settings.consent.clone());

        match consent.run(token.raw(), timeout).await {
            Ok(settled) if is_off_aggregator(&settled) => {
                info!(token = token.raw(), url = %settled, "Browser settled off the aggregator");
                Ok(vec![strip_tracking(&settled)])
            }
            Ok(settled) => {
                debug!(token = token.raw(), url = %settled, "Browser settled on the aggregator");
                Ok(Vec::new())
            }
            Err(e) => {
                info!(token = token.raw(), error = %e, "Browser strategy found nothing");
                Ok(Vec::new())
            }
        }
    }
}

/// One isolated browser process with a private profile directory.
struct ChromeSession {
    browser: Browser,
    page: Option<Page>,
    handler_task: JoinHandle<()>,
    profile: Option<TempDir>,
    live_sessions: Arc<AtomicUsize>,
    closed: bool,
}

impl ChromeSession {
    fn page(&self) -> ResolverResult<&Page> {
        self.page
            .as_ref()
            .ok_or_else(|| ResolverError::Browser("no page open".into()))
    }

    async fn evaluate_bool(&self, script: &str) -> ResolverResult<bool> {
        self.page()?
            .evaluate(script)
            .await
            .map_err(|e| ResolverError::Browser(format!("script failed: {}", e)))?
            .into_value::<bool>()
            .map_err(|e| ResolverError::Browser(format!("unexpected script result: {}", e)))
    }

    fn mark_closed(&mut self) {
        if !self.closed {
            self.closed = true;
            self.handler_task.abort();
            self.live_sessions.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl PageDriver for ChromeSession {
    async fn goto(&mut self, url: &str) -> ResolverResult<()> {
        let page = self.browser.new_page(url).await.map_err(|e| {
            ResolverError::Browser(format!("navigation to {} failed: {}", url, e))
        })?;
        self.page = Some(page);
        Ok(())
    }

    async fn current_url(&mut self) -> ResolverResult<Option<String>> {
        self.page()?
            .url()
            .await
            .map_err(|e| ResolverError::Browser(format!("reading address failed: {}", e)))
    }

    async fn has_consent_control(&mut self) -> ResolverResult<bool> {
        self.evaluate_bool(&consent_script(false)).await
    }

    async fn accept_consent(&mut self) -> ResolverResult<bool> {
        let clicked = self.evaluate_bool(&consent_script(true)).await?;
        if clicked {
            if let Err(e) = self.page()?.wait_for_navigation().await {
                debug!(error = %e, "No navigation after consent click");
            }
        }
        Ok(clicked)
    }

    async fn close(&mut self) -> ResolverResult<()> {
        if self.closed {
            return Ok(());
        }

        if let Some(page) = self.page.take() {
            if let Err(e) = page.close().await {
                debug!(error = %e, "Page close failed");
            }
        }
        if let Err(e) = self.browser.close().await {
            debug!(error = %e, "Browser close command failed");
        }
        if let Some(Err(e)) = self.browser.kill().await {
            debug!(error = %e, "Browser kill failed");
        }
        if let Err(e) = self.browser.wait().await {
            warn!(error = %e, "Waiting for browser exit failed");
        }

        self.mark_closed();
        if let Some(profile) = self.profile.take() {
            profile.close()?;
        }
        Ok(())
    }
}

impl Drop for ChromeSession {
    fn drop(&mut self) {
        // chromiumoxide kills the child process when `Browser` drops.
        self.mark_closed();
    }
}

/// Submit controls of a form posting to the consent host, used when no label matches.
const CONSENT_FORM_SELECTOR: &str =
    r#"form[action*="consent."] button, form[action*="consent."] input[type="submit"]"#;

/// Script that finds the first accept control by label, falling back to the
/// consent form's submit control, and clicks it when `click` is set.
fn consent_script(click: bool) -> String {
    let labels = serde_json::to_string(CONSENT_LABELS).unwrap_or_else(|_| "[]".to_string());
    let form_selector =
        serde_json::to_string(CONSENT_FORM_SELECTOR).unwrap_or_else(|_| "''".to_string());
    format!(
        r#"(() => {{
            const labels = {labels};
            const controls = Array.from(document.querySelectorAll(
                'button, [role="button"], input[type="submit"]'
            ));
            const labelled = controls.find((el) => {{
                const text = (el.innerText || el.value || el.getAttribute('aria-label') || '')
                    .trim()
                    .toLowerCase();
                return labels.some((label) => text === label || text.startsWith(label));
            }});
            const control = labelled || document.querySelector({form_selector});
            if (!control) {{
                return false;
            }}
            if ({click}) {{
                control.click();
            }}
            return true;
        }})()"#,
        labels = labels,
        form_selector = form_selector,
        click = click
    )
}
