use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::domain::ResolutionResult;
use crate::storage::traits::ResolutionCache;

struct Entry {
    result: ResolutionResult,
    stored_at: Instant,
}

/// In-process TTL cache. Expired entries are dropped lazily on lookup and on `put`.
pub struct MemoryResolutionCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryResolutionCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        let ttl = self.ttl;
        self.lock()
            .values()
            .filter(|entry| entry.stored_at.elapsed() < ttl)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        // A panic while holding the lock cannot leave a half-written entry.
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ResolutionCache for MemoryResolutionCache {
    fn get(&self, token: &str) -> Option<ResolutionResult> {
        let mut entries = self.lock();

        let expired = match entries.get(token) {
            Some(entry) if entry.stored_at.elapsed() < self.ttl => {
                return Some(entry.result.clone());
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            entries.remove(token);
            debug!(token, "Cache entry expired");
        }
        None
    }

    fn put(&self, result: &ResolutionResult) {
        if !result.strategy.is_publisher_url() {
            return;
        }

        let ttl = self.ttl;
        let mut entries = self.lock();
        entries.retain(|_, entry| entry.stored_at.elapsed() < ttl);
        entries.insert(
            result.original_token.clone(),
            Entry {
                result: result.clone(),
                stored_at: Instant::now(),
            },
        );
    }

    fn invalidate(&self, token: &str) -> bool {
        self.lock().remove(token).is_some()
    }

    fn clear(&self) {
        self.lock().clear();
    }
}
