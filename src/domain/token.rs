use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Tokens longer than this rarely carry an offline-decodable payload.
pub const LONG_TOKEN_THRESHOLD: usize = 150;

const AGGREGATOR_HOST: &str = "news.google.com";

/// Path prefixes under the aggregator host, most specific first.
const FAMILY_PREFIXES: &[(&str, TokenFamily)] = &[
    ("/rss/articles/", TokenFamily::Articles),
    ("/articles/", TokenFamily::Articles),
    ("/rss/read/", TokenFamily::Read),
    ("/read/", TokenFamily::Read),
    ("/rss/stories/", TokenFamily::Stories),
    ("/stories/", TokenFamily::Stories),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenFamily {
    Articles,
    Read,
    Stories,
}

impl TokenFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenFamily::Articles => "articles",
            TokenFamily::Read => "read",
            TokenFamily::Stories => "stories",
        }
    }

    /// Story clusters group several articles and never embed a single URL.
    pub fn embeds_url(&self) -> bool {
        !matches!(self, TokenFamily::Stories)
    }
}

impl std::str::FromStr for TokenFamily {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "articles" => Ok(TokenFamily::Articles),
            "read" => Ok(TokenFamily::Read),
            "stories" => Ok(TokenFamily::Stories),
            _ => Err(format!("Unknown token family: {}", s)),
        }
    }
}

impl std::fmt::Display for TokenFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LengthClass {
    Short,
    Long,
}

/// Where a token was captured. Feed-article tokens get a longer browser budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenOrigin {
    Feed,
    Scraped,
}

/// Split an aggregator URL into its family and the encoded payload segment.
///
/// The payload is the text between the family prefix and the first `?` or `#`.
pub fn split_family(raw: &str) -> Option<(TokenFamily, &str)> {
    let rest = raw
        .strip_prefix("https://")
        .or_else(|| raw.strip_prefix("http://"))?;
    let path = rest.strip_prefix(AGGREGATOR_HOST)?;

    FAMILY_PREFIXES.iter().find_map(|(prefix, family)| {
        let tail = path.strip_prefix(prefix)?;
        let payload = tail.split(['?', '#']).next().unwrap_or_default();
        if payload.is_empty() {
            None
        } else {
            Some((*family, payload))
        }
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    raw: String,
    family: Option<TokenFamily>,
    origin: TokenOrigin,
}

impl Token {
    /// A token captured directly from a scraped page.
    pub fn new(raw: impl Into<String>) -> Self {
        Self::with_origin(raw, TokenOrigin::Scraped)
    }

    /// A token taken from a feed entry.
    pub fn from_feed(raw: impl Into<String>) -> Self {
        Self::with_origin(raw, TokenOrigin::Feed)
    }

    pub fn with_origin(raw: impl Into<String>, origin: TokenOrigin) -> Self {
        let raw = raw.into().trim().to_string();
        let family = split_family(&raw).map(|(family, _)| family);
        Self {
            raw,
            family,
            origin,
        }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn family(&self) -> Option<TokenFamily> {
        self.family
    }

    pub fn origin(&self) -> TokenOrigin {
        self.origin
    }

    pub fn length_class(&self) -> LengthClass {
        if self.raw.len() > LONG_TOKEN_THRESHOLD {
            LengthClass::Long
        } else {
            LengthClass::Short
        }
    }

    pub fn is_long(&self) -> bool {
        self.length_class() == LengthClass::Long
    }

    pub fn is_story_cluster(&self) -> bool {
        self.family == Some(TokenFamily::Stories)
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.raw)
    }
}

static TOKEN_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"https?://news\.google\.com/(?:rss/)?(?:articles|read|stories)/[A-Za-z0-9_-]+(?:\?[^\s"'<>]*)?"#,
    )
    .expect("token pattern is valid")
});

/// Every aggregator link found in free text (HTML, logs, pasted pages),
/// first occurrence order, without duplicates.
pub fn scan_tokens(text: &str) -> Vec<Token> {
    let mut seen = HashSet::new();
    TOKEN_PATTERN
        .find_iter(text)
        .map(|m| m.as_str())
        .filter(|raw| seen.insert(*raw))
        .map(Token::new)
        .collect()
}
