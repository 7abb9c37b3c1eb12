pub mod google_news;
pub mod traits;

pub use google_news::GoogleNewsSource;
pub use traits::FeedSource;
