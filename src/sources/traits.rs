use async_trait::async_trait;

use crate::domain::FeedItem;
use crate::errors::ResolverResult;

#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Check if this source understands the given feed or topic URL
    fn can_handle(&self, url: &str) -> bool;

    /// Fetch the feed behind `url` and return its items in feed order
    async fn extract(&self, url: &str) -> ResolverResult<Vec<FeedItem>>;
}
