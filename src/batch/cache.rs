use std::num::NonZeroUsize;

use lru::LruCache;

use crate::operations::Projection;

/// Bounded LRU cache of per-entry projections
///
/// Keyed by request signature and raw URL. Each execution context owns its
/// own instance; caches are never shared with the offload worker.
pub struct ResultCache {
    entries: LruCache<(String, String), Projection>,
    hits: u64,
    misses: u64,
}

impl ResultCache {
    /// Returns `None` for a zero capacity, which disables caching
    pub fn new(capacity: usize) -> Option<Self> {
        NonZeroUsize::new(capacity).map(|capacity| Self {
            entries: LruCache::new(capacity),
            hits: 0,
            misses: 0,
        })
    }

    /// Looks up a projection, marking it most recently used
    pub fn get(&mut self, signature: &str, url: &str) -> Option<Projection> {
        // LruCache::get needs an owned key of the same type
        let key = (signature.to_owned(), url.to_owned());
        match self.entries.get(&key) {
            Some(projection) => {
                self.hits += 1;
                Some(projection.clone())
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    pub fn put(&mut self, signature: &str, url: &str, projection: Projection) {
        self.entries
            .put((signature.to_owned(), url.to_owned()), projection);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }
}
