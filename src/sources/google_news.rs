use std::time::Duration;

use async_trait::async_trait;
use feed_rs::parser;
use reqwest::{Client, StatusCode};
use scraper::{Html, Selector};
use tracing::{debug, info, warn};
use url::Url;

use crate::codec;
use crate::domain::{FeedItem, Token};
use crate::errors::{ResolverError, ResolverResult};
use crate::resolvers::redirect::DEFAULT_USER_AGENT;
use crate::sources::traits::FeedSource;

const FEED_SEGMENT: &str = "/rss";

/// Query parameters that select the feed edition; everything else is noise.
const LOCALE_PARAMS: &[&str] = &["hl", "gl", "ceid"];

pub struct GoogleNewsSource {
    client: Client,
}

impl GoogleNewsSource {
    pub fn new() -> Self {
        Self::with_user_agent(DEFAULT_USER_AGENT)
    }

    pub fn with_user_agent(user_agent: &str) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(30))
                .user_agent(user_agent)
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }

    /// Map a topic, search or section page URL to its feed representation
    /// by inserting the `/rss` path segment.
    pub fn build_feed_url(url: &str) -> ResolverResult<String> {
        let mut parsed = Url::parse(url).map_err(|e| ResolverError::InvalidUrl(e.to_string()))?;

        let path = parsed.path().to_string();
        if path == FEED_SEGMENT || path.starts_with("/rss/") {
            return Ok(parsed.to_string());
        }

        let feed_path = match path.as_str() {
            "" | "/" | "/home" => FEED_SEGMENT.to_string(),
            other => format!("{}{}", FEED_SEGMENT, other),
        };
        parsed.set_path(&feed_path);

        Ok(parsed.to_string())
    }

    /// Drop every query parameter except the edition selectors.
    pub fn normalize_feed_url(url: &str) -> String {
        let Ok(mut parsed) = Url::parse(url) else {
            return url.to_string();
        };

        let kept: Vec<(String, String)> = parsed
            .query_pairs()
            .filter(|(name, _)| LOCALE_PARAMS.contains(&name.as_ref()))
            .map(|(name, value)| (name.into_owned(), value.into_owned()))
            .collect();

        if kept.is_empty() {
            parsed.set_query(None);
        } else {
            parsed.query_pairs_mut().clear().extend_pairs(kept);
        }

        parsed.to_string()
    }

    /// GET the feed; `None` means the aggregator answered 404.
    async fn fetch(&self, url: &str) -> ResolverResult<Option<Vec<u8>>> {
        let response = self.client.get(url).send().await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(ResolverError::Network(format!("{} returned {}", url, status)));
        }

        Ok(Some(response.bytes().await?.to_vec()))
    }

    pub fn parse_items(bytes: &[u8]) -> ResolverResult<Vec<FeedItem>> {
        let parsed = parser::parse(bytes).map_err(|e| ResolverError::FeedParse(e.to_string()))?;

        let items = parsed
            .entries
            .into_iter()
            .filter_map(|entry| {
                let link = entry.links.into_iter().next()?.href;

                let raw_title = entry
                    .title
                    .map(|t| t.content)
                    .unwrap_or_else(|| "Untitled".to_string());

                let source = entry
                    .summary
                    .as_ref()
                    .and_then(|summary| Self::source_from_description(&summary.content))
                    .or_else(|| Self::source_from_title(&raw_title));

                let title = match &source {
                    Some(source) => Self::strip_source_suffix(&raw_title, source),
                    None => raw_title,
                };

                let published = entry
                    .published
                    .or(entry.updated)
                    .map(|dt| dt.to_rfc3339());

                let decoded = codec::decode(&link);

                Some(
                    FeedItem::new(Token::from_feed(link), title)
                        .with_published(published)
                        .with_source(source)
                        .with_decoded(decoded),
                )
            })
            .collect();

        Ok(items)
    }

    /// Publisher name from the `<font>` element the aggregator puts in item descriptions.
    fn source_from_description(html: &str) -> Option<String> {
        let document = Html::parse_fragment(html);
        let selector = Selector::parse("font").ok()?;

        document
            .select(&selector)
            .map(|element| element.text().collect::<String>().trim().to_string())
            .find(|text| !text.is_empty())
    }

    /// Publisher name from a "Headline - Publisher" title.
    fn source_from_title(title: &str) -> Option<String> {
        let (_, source) = title.rsplit_once(" - ")?;
        let source = source.trim();
        if source.is_empty() {
            None
        } else {
            Some(source.to_string())
        }
    }

    fn strip_source_suffix(title: &str, source: &str) -> String {
        title
            .strip_suffix(source)
            .and_then(|rest| rest.strip_suffix(" - "))
            .map(|rest| rest.trim().to_string())
            .unwrap_or_else(|| title.to_string())
    }
}

impl Default for GoogleNewsSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FeedSource for GoogleNewsSource {
    fn can_handle(&self, url: &str) -> bool {
        Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.eq_ignore_ascii_case("news.google.com")))
            .unwrap_or(false)
    }

    async fn extract(&self, url: &str) -> ResolverResult<Vec<FeedItem>> {
        let feed_url = Self::build_feed_url(url)?;

        let bytes = match self.fetch(&feed_url).await? {
            Some(bytes) => bytes,
            None => {
                let normalized = Self::normalize_feed_url(&feed_url);
                if normalized == feed_url {
                    return Err(ResolverError::FeedNotFound(feed_url));
                }
                warn!(feed_url = %feed_url, retry_url = %normalized, "Feed not found, retrying without extra query parameters");
                self.fetch(&normalized)
                    .await?
                    .ok_or(ResolverError::FeedNotFound(normalized))?
            }
        };

        let items = Self::parse_items(&bytes)?;
        let decoded = items.iter().filter(|item| item.decoded.is_some()).count();
        info!(feed_url = %feed_url, items = items.len(), decoded, "Extracted feed items");
        debug!(feed_url = %feed_url, "Feed extraction finished");

        Ok(items)
    }
}
