use thiserror::Error;

#[derive(Error, Debug)]
pub enum ResolverError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Input errors
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // Network errors
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Request timed out: {0}")]
    NetworkTimeout(String),

    #[error("Network error: {0}")]
    Network(String),

    // Feed errors
    #[error("Feed not found: {0}")]
    FeedNotFound(String),

    #[error("Feed parsing failed: {0}")]
    FeedParse(String),

    // Resolution errors
    #[error("Consent interstitial not dismissed: {0}")]
    ConsentTimeout(String),

    #[error("Token family cannot be resolved to a single article: {0}")]
    UnresolvableFamily(String),

    // Browser errors
    #[error("Browser automation unavailable: {0}")]
    BrowserUnavailable(String),

    #[error("Browser error: {0}")]
    Browser(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ResolverError {
    /// Errors that abort a whole batch instead of a single token.
    pub fn is_systemic(&self) -> bool {
        matches!(self, ResolverError::BrowserUnavailable(_))
    }

    /// Errors worth another attempt within a strategy's retry budget.
    pub fn is_retriable(&self) -> bool {
        match self {
            ResolverError::NetworkTimeout(_) => true,
            ResolverError::Http(e) => e.is_timeout(),
            _ => false,
        }
    }
}

pub type ResolverResult<T> = Result<T, ResolverError>;
