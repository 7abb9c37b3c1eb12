use serde::{Deserialize, Serialize};

use super::Token;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedItem {
    pub token: Token,
    pub title: String,
    pub published: Option<String>,
    pub source: Option<String>,
    /// Offline decode attempted at extraction time.
    pub decoded: Option<String>,
}

impl FeedItem {
    pub fn new(token: Token, title: String) -> Self {
        Self {
            token,
            title,
            published: None,
            source: None,
            decoded: None,
        }
    }

    pub fn with_published(mut self, published: Option<String>) -> Self {
        self.published = published;
        self
    }

    pub fn with_source(mut self, source: Option<String>) -> Self {
        self.source = source;
        self
    }

    pub fn with_decoded(mut self, decoded: Option<String>) -> Self {
        self.decoded = decoded;
        self
    }
}
