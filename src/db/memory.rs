use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{
    collect_recent_ids, AdStore, ContentStore, InteractionStore, ShownEvent, ShownHistoryStore,
    MAX_HISTORY_EVENTS,
};
use crate::error::{AppError, AppResult};
use crate::models::{Ad, AdMetricEvent, AdMetricKind, ContentItem, Emotion, Interaction};

/// Process-local implementation of every store trait
#[derive(Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<RwLock<StoreInner>>,
}

#[derive(Default)]
struct StoreInner {
    interactions: HashMap<String, Vec<Interaction>>,
    content: Vec<ContentItem>,
    ads: Vec<Ad>,
    /// Newest event at the front
    history: HashMap<String, VecDeque<ShownEvent>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with a catalog and ads
    pub fn with_data(content: Vec<ContentItem>, ads: Vec<Ad>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(StoreInner {
                content,
                ads,
                ..Default::default()
            })),
        }
    }

    pub async fn add_content(&self, item: ContentItem) {
        self.inner.write().await.content.push(item);
    }

    pub async fn add_ad(&self, ad: Ad) {
        self.inner.write().await.ads.push(ad);
    }

    /// Current state of an ad, metrics included
    pub async fn ad(&self, ad_id: &str) -> Option<Ad> {
        self.inner.read().await.ads.iter().find(|a| a.id == ad_id).cloned()
    }

    async fn push_metric(&self, ad_id: &str, event: AdMetricEvent) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        let ad = inner
            .ads
            .iter_mut()
            .find(|a| a.id == ad_id)
            .ok_or_else(|| AppError::NotFound(format!("ad {}", ad_id)))?;
        ad.metrics.push(event);
        Ok(())
    }
}

#[async_trait::async_trait]
impl InteractionStore for InMemoryStore {
    async fn list_by_user(&self, user_id: &str) -> AppResult<Vec<Interaction>> {
        Ok(self
            .inner
            .read()
            .await
            .interactions
            .get(user_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn append(&self, interaction: Interaction) -> AppResult<()> {
        self.inner
            .write()
            .await
            .interactions
            .entry(interaction.user_id.clone())
            .or_default()
            .push(interaction);
        Ok(())
    }
}

#[async_trait::async_trait]
impl ContentStore for InMemoryStore {
    async fn list_all(&self) -> AppResult<Vec<ContentItem>> {
        Ok(self.inner.read().await.content.clone())
    }
}

#[async_trait::async_trait]
impl AdStore for InMemoryStore {
    async fn list_active(&self) -> AppResult<Vec<Ad>> {
        Ok(self
            .inner
            .read()
            .await
            .ads
            .iter()
            .filter(|a| a.is_active)
            .cloned()
            .collect())
    }

    async fn record_impression(
        &self,
        ad_id: &str,
        user_id: &str,
        emotion_before: Option<Emotion>,
        emotion_after: Option<Emotion>,
    ) -> AppResult<()> {
        self.push_metric(
            ad_id,
            AdMetricEvent {
                kind: AdMetricKind::Impression,
                timestamp: Utc::now(),
                user_id: Some(user_id.to_string()),
                emotion_before,
                emotion_after,
            },
        )
        .await
    }

    async fn record_click(&self, ad_id: &str, user_id: &str) -> AppResult<()> {
        self.push_metric(
            ad_id,
            AdMetricEvent {
                kind: AdMetricKind::Click,
                timestamp: Utc::now(),
                user_id: Some(user_id.to_string()),
                emotion_before: None,
                emotion_after: None,
            },
        )
        .await
    }
}

#[async_trait::async_trait]
impl ShownHistoryStore for InMemoryStore {
    async fn recent_ids(
        &self,
        user_id: &str,
        max_age: Duration,
        max_count: usize,
    ) -> AppResult<Vec<String>> {
        let inner = self.inner.read().await;
        let Some(events) = inner.history.get(user_id) else {
            return Ok(Vec::new());
        };
        Ok(collect_recent_ids(events, Utc::now() - max_age, max_count))
    }

    async fn record(&self, user_id: &str, ids: &[String], at: DateTime<Utc>) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        let events = inner.history.entry(user_id.to_string()).or_default();
        events.push_front(ShownEvent {
            ids: ids.to_vec(),
            at,
        });
        events.truncate(MAX_HISTORY_EVENTS);
        Ok(())
    }

    async fn clear(&self, user_id: &str) -> AppResult<()> {
        self.inner.write().await.history.remove(user_id);
        Ok(())
    }

    async fn last_activity(&self, user_id: &str) -> AppResult<Option<DateTime<Utc>>> {
        Ok(self
            .inner
            .read()
            .await
            .history
            .get(user_id)
            .and_then(|events| events.front())
            .map(|e| e.at))
    }
}
