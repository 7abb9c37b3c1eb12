use crate::domain::ResolutionResult;

/// Previously resolved tokens, keyed by the raw token string.
#[cfg_attr(test, mockall::automock)]
pub trait ResolutionCache: Send + Sync {
    /// A live entry for `token`, if any.
    fn get(&self, token: &str) -> Option<ResolutionResult>;

    /// Remember a result. Only publisher-URL strategies are stored.
    fn put(&self, result: &ResolutionResult);

    /// Drop one entry; returns whether it was present.
    fn invalidate(&self, token: &str) -> bool;

    fn clear(&self);
}
