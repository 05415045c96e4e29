use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;

use crate::models::Ad;

/// Default freshness window of the ad list
pub const AD_CACHE_TTL: Duration = Duration::from_secs(300);

/// Live ad list with a freshness window
///
/// Holds a single entry that is refreshed wholesale: once stale it is
/// replaced by a full reload from the ad store, never patched. Clones
/// share the same entry.
#[derive(Clone)]
pub struct AdCache {
    cache: Cache<(), Arc<Vec<Ad>>>,
}

impl AdCache {
    pub fn new(ttl: Duration) -> Self {
        let cache = Cache::builder().max_capacity(1).time_to_live(ttl).build();
        Self { cache }
    }

    /// Cached ads if loaded within the TTL
    pub async fn get_fresh(&self) -> Option<Arc<Vec<Ad>>> {
        self.cache.get(&()).await
    }

    pub async fn replace(&self, ads: Vec<Ad>) -> Arc<Vec<Ad>> {
        let ads = Arc::new(ads);
        self.cache.insert((), Arc::clone(&ads)).await;
        ads
    }

    /// Forces the next read to reload from the ad store
    pub async fn invalidate(&self) {
        self.cache.invalidate(&()).await;
    }
}

impl Default for AdCache {
    fn default() -> Self {
        Self::new(AD_CACHE_TTL)
    }
}

impl std::fmt::Debug for AdCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdCache")
            .field("entries", &self.cache.entry_count())
            .finish()
    }
}
