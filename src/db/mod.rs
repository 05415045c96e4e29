//! Store abstractions consumed by the feed engine
//!
//! Backends implement these traits; the engine only depends on the traits,
//! so stores can be swapped (in-memory for tests and local runs, Redis for
//! shown history in deployments).

use chrono::{DateTime, Duration, Utc};

use crate::error::AppResult;
use crate::models::{Ad, ContentItem, Emotion, Interaction};

pub mod cache;
pub mod memory;
pub mod redis;

pub use cache::AdCache;
pub use memory::InMemoryStore;
pub use self::redis::{create_redis_client, HistoryKey, RedisShownHistory};

/// Maximum feed-generation events kept per user in shown history
pub const MAX_HISTORY_EVENTS: usize = 100;

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait InteractionStore: Send + Sync {
    /// All interactions of a user, in no particular order
    async fn list_by_user(&self, user_id: &str) -> AppResult<Vec<Interaction>>;

    async fn append(&self, interaction: Interaction) -> AppResult<()>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ContentStore: Send + Sync {
    async fn list_all(&self) -> AppResult<Vec<ContentItem>>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait AdStore: Send + Sync {
    /// Ads flagged active; validity windows are checked by the caller
    async fn list_active(&self) -> AppResult<Vec<Ad>>;

    async fn record_impression(
        &self,
        ad_id: &str,
        user_id: &str,
        emotion_before: Option<Emotion>,
        emotion_after: Option<Emotion>,
    ) -> AppResult<()>;

    async fn record_click(&self, ad_id: &str, user_id: &str) -> AppResult<()>;
}

/// Record of content delivered to each user
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ShownHistoryStore: Send + Sync {
    /// Distinct ids shown within `max_age`, most recently shown first
    async fn recent_ids(
        &self,
        user_id: &str,
        max_age: Duration,
        max_count: usize,
    ) -> AppResult<Vec<String>>;

    async fn record(&self, user_id: &str, ids: &[String], at: DateTime<Utc>) -> AppResult<()>;

    async fn clear(&self, user_id: &str) -> AppResult<()>;

    /// Time of the user's latest recorded feed, if any
    async fn last_activity(&self, user_id: &str) -> AppResult<Option<DateTime<Utc>>>;
}

/// One feed-generation event as kept in shown history
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ShownEvent {
    pub ids: Vec<String>,
    pub at: DateTime<Utc>,
}

/// Distinct ids from events (newest first) within the age and count limits
pub fn collect_recent_ids<'a>(
    events: impl IntoIterator<Item = &'a ShownEvent>,
    cutoff: DateTime<Utc>,
    max_count: usize,
) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut ids = Vec::new();

    for event in events.into_iter().filter(|e| e.at >= cutoff) {
        for id in &event.ids {
            if ids.len() >= max_count {
                return ids;
            }
            if seen.insert(id.as_str()) {
                ids.push(id.clone());
            }
        }
    }

    ids
}
