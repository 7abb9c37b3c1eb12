pub mod aggregator;
pub mod consent;
pub mod feed_item;
pub mod resolution;
pub mod token;

pub use consent::ConsentState;
pub use feed_item::FeedItem;
pub use resolution::{ArticleRecord, ResolutionBatch, ResolutionResult, Strategy, StrategyCounters};
pub use token::{scan_tokens, LengthClass, Token, TokenFamily, TokenOrigin, LONG_TOKEN_THRESHOLD};
