use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::errors::{ResolverError, ResolverResult};
use crate::resolvers::redirect::DEFAULT_USER_AGENT;
use crate::services::ResolveOptions;

#[derive(Debug, Clone)]
pub struct Config {
    pub concurrency: usize,
    pub timeout: Duration,
    pub feed_timeout: Duration,
    pub enable_browser: bool,
    pub browser_concurrency: usize,
    pub cooldown_every: usize,
    pub cooldown: Duration,
    pub cache_ttl: Duration,
    pub user_agent: String,
    pub chrome_bin: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        let opts = ResolveOptions::default();
        Self {
            concurrency: opts.concurrency,
            timeout: opts.timeout,
            feed_timeout: opts.feed_timeout,
            enable_browser: opts.enable_browser_fallback,
            browser_concurrency: opts.browser_concurrency,
            cooldown_every: opts.cooldown_every,
            cooldown: opts.cooldown,
            cache_ttl: Duration::from_secs(3600),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            chrome_bin: None,
        }
    }
}

impl Config {
    /// Get the directory where the executable is located
    fn exe_dir() -> Option<PathBuf> {
        std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
    }

    pub fn from_env() -> ResolverResult<Self> {
        // Try to load .env from executable's directory first
        if let Some(dir) = Self::exe_dir() {
            let env_path = dir.join(".env");
            if env_path.exists() {
                dotenvy::from_path(&env_path).ok();
            }
        }
        // Fall back to current directory
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from any key/value source; unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> ResolverResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        Ok(Self {
            concurrency: parse_or(&lookup, "RESOLVER_CONCURRENCY", defaults.concurrency)?,
            timeout: millis_or(&lookup, "RESOLVER_TIMEOUT_MS", defaults.timeout)?,
            feed_timeout: millis_or(&lookup, "RESOLVER_FEED_TIMEOUT_MS", defaults.feed_timeout)?,
            enable_browser: bool_or(&lookup, "RESOLVER_BROWSER", defaults.enable_browser)?,
            browser_concurrency: parse_or(
                &lookup,
                "RESOLVER_BROWSER_CONCURRENCY",
                defaults.browser_concurrency,
            )?,
            cooldown_every: parse_or(&lookup, "RESOLVER_COOLDOWN_EVERY", defaults.cooldown_every)?,
            cooldown: Duration::from_secs(parse_or(
                &lookup,
                "RESOLVER_COOLDOWN_SECS",
                defaults.cooldown.as_secs(),
            )?),
            cache_ttl: Duration::from_secs(parse_or(
                &lookup,
                "RESOLVER_CACHE_TTL_SECS",
                defaults.cache_ttl.as_secs(),
            )?),
            user_agent: lookup("RESOLVER_USER_AGENT")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.user_agent),
            chrome_bin: lookup("CHROME_BIN")
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
        })
    }

    pub fn resolve_options(&self) -> ResolveOptions {
        ResolveOptions {
            concurrency: self.concurrency,
            timeout: self.timeout,
            feed_timeout: self.feed_timeout,
            enable_browser_fallback: self.enable_browser,
            browser_concurrency: self.browser_concurrency,
            cooldown_every: self.cooldown_every,
            cooldown: self.cooldown,
        }
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> ResolverResult<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ResolverError::Config(format!("{} must be a number, got '{}'", key, value))),
        None => Ok(default),
    }
}

fn millis_or<F>(lookup: &F, key: &str, default: Duration) -> ResolverResult<Duration>
where
    F: Fn(&str) -> Option<String>,
{
    let millis = parse_or(lookup, key, default.as_millis() as u64)?;
    Ok(Duration::from_millis(millis))
}

fn bool_or<F>(lookup: &F, key: &str, default: bool) -> ResolverResult<bool>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key).map(|v| v.trim().to_lowercase()) {
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => Ok(true),
        Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => Ok(false),
        Some(v) => Err(ResolverError::Config(format!("{} must be a boolean, got '{}'", key, v))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = Config::from_lookup(lookup(&[])).unwrap();

        assert_eq!(config.concurrency, 1);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.feed_timeout, Duration::from_secs(45));
        assert!(config.enable_browser);
        assert_eq!(config.cooldown_every, 10);
        assert_eq!(config.chrome_bin, None);
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("RESOLVER_CONCURRENCY", "4"),
            ("RESOLVER_TIMEOUT_MS", "1500"),
            ("RESOLVER_BROWSER", "off"),
            ("RESOLVER_COOLDOWN_SECS", "2"),
            ("CHROME_BIN", "/opt/chrome/chrome"),
        ]))
        .unwrap();

        assert_eq!(config.concurrency, 4);
        assert_eq!(config.timeout, Duration::from_millis(1500));
        assert!(!config.enable_browser);
        assert_eq!(config.cooldown, Duration::from_secs(2));
        assert_eq!(config.chrome_bin, Some(PathBuf::from("/opt/chrome/chrome")));

        let opts = config.resolve_options();
        assert_eq!(opts.concurrency, 4);
        assert!(!opts.enable_browser_fallback);
    }

    #[test]
    fn test_malformed_number_is_config_error() {
        let err = Config::from_lookup(lookup(&[("RESOLVER_CONCURRENCY", "many")])).unwrap_err();
        assert!(matches!(err, ResolverError::Config(_)));
    }

    #[test]
    fn test_malformed_bool_is_config_error() {
        let err = Config::from_lookup(lookup(&[("RESOLVER_BROWSER", "maybe")])).unwrap_err();
        assert!(matches!(err, ResolverError::Config(_)));
    }
}
