//! Feed generation: store access around the synchronous pipeline

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;

use crate::config::EngineSettings;
use crate::db::{AdCache, AdStore, ContentStore, InteractionStore, ShownHistoryStore};
use crate::error::{AppError, AppResult};
use crate::models::{Ad, ContentItem, FeedItem, FeedResponse, Interaction, InteractionKind};
use crate::services::ads::{self, AdPlacement, AdSlot};
use crate::services::assembler::{self, AssemblyParams};
use crate::services::engagement::EngagementTally;
use crate::services::keywords;
use crate::services::loop_detector::{self, EmotionLoop};
use crate::services::pattern;
use crate::services::pools::{resolve_catalog, ContentPools};
use crate::services::scoring::RelevanceScorer;
use crate::services::story_arc;
use crate::services::transition::TransitionModel;

/// Everything the pipeline reads for one request
pub struct FeedInputs<'a> {
    pub interactions: &'a [Interaction],
    pub catalog: &'a [ContentItem],
    /// Most recently shown first
    pub shown_ids: &'a [String],
    pub ads: &'a [Ad],
    pub tally: &'a EngagementTally,
}

#[derive(Debug, Clone)]
pub struct ComposedFeed {
    pub response: FeedResponse,
    /// The feed as it was before the ad went in
    pub without_ad: Vec<FeedItem>,
    pub placement: Option<AdPlacement>,
    pub emotion_loop: Option<EmotionLoop>,
    pub timed_out: bool,
}

/// Runs analysis, arc planning, assembly and ad placement
///
/// Never fails: every stage degrades to its documented default.
pub fn compose_feed<R: Rng + ?Sized>(
    inputs: &FeedInputs<'_>,
    target_len: usize,
    settings: &EngineSettings,
    now: DateTime<Utc>,
    rng: &mut R,
) -> ComposedFeed {
    let distribution = pattern::analyze_or_uniform(inputs.interactions, now);
    let model = TransitionModel::from_interactions(inputs.interactions);
    let emotion_loop = loop_detector::detect(inputs.interactions);

    let by_id: HashMap<&str, &ContentItem> = inputs
        .catalog
        .iter()
        .map(|item| (item.id.as_str(), item))
        .collect();
    let recent_keywords = keywords::recent_for_user(inputs.interactions, &by_id, now);

    let entries = resolve_catalog(inputs.catalog);
    let pools = ContentPools::new(&entries, inputs.shown_ids, now);
    let arc = story_arc::plan(
        &model,
        &pools,
        &recent_keywords,
        story_arc::arc_capacity(target_len),
        rng,
    );

    let scorer = RelevanceScorer::new(
        &distribution,
        inputs.tally,
        &recent_keywords,
        settings.keyword_weight,
        now,
    );
    let params = AssemblyParams {
        target_len,
        diversity_ceiling: settings.diversity_ceiling,
        deadline: Instant::now() + settings.scoring_deadline,
        shuffle_tail: settings.shuffle_tail,
        cold_start: inputs.interactions.is_empty(),
    };
    let assembly = assembler::assemble(&pools, &arc, &scorer, emotion_loop.as_ref(), &params, rng);

    let mut feed: Vec<FeedItem> = assembly
        .items
        .iter()
        .map(|&i| FeedItem::Content {
            id: entries[i].id().to_string(),
            emotion: entries[i].emotion,
        })
        .collect();
    let without_ad = feed.clone();

    let mut context_keywords: HashSet<String> = recent_keywords.clone();
    if let Some(preceding) = arc
        .peak_index
        .and_then(|peak| peak.checked_sub(1))
        .and_then(|pos| assembly.items.get(pos))
    {
        context_keywords.extend(entries[*preceding].keywords.iter().cloned());
    }

    let slot = AdSlot {
        peak: arc.peak_index,
        arc_len: assembly.arc_len,
        target_len,
    };
    let placement = ads::place_ad_or_skip(
        &mut feed,
        slot,
        inputs.ads,
        &context_keywords,
        now,
        rng,
    );

    ComposedFeed {
        response: FeedResponse {
            feed,
            emotion_distribution: distribution,
            current_emotion: model.current_emotion(),
            peak_ad_index: arc.peak_index,
        },
        without_ad,
        placement,
        emotion_loop,
        timed_out: assembly.timed_out,
    }
}

/// Orchestrates stores, shared state and the pipeline
#[derive(Clone)]
pub struct FeedEngine {
    interactions: Arc<dyn InteractionStore>,
    content: Arc<dyn ContentStore>,
    ads: Arc<dyn AdStore>,
    history: Arc<dyn ShownHistoryStore>,
    tally: Arc<RwLock<EngagementTally>>,
    ad_cache: AdCache,
    settings: EngineSettings,
}

impl FeedEngine {
    pub fn new(
        interactions: Arc<dyn InteractionStore>,
        content: Arc<dyn ContentStore>,
        ads: Arc<dyn AdStore>,
        history: Arc<dyn ShownHistoryStore>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            interactions,
            content,
            ads,
            history,
            tally: Arc::new(RwLock::new(EngagementTally::new())),
            ad_cache: AdCache::new(settings.ad_cache_ttl),
            settings,
        }
    }

    /// Shares an existing ad cache instead of the engine's own
    pub fn with_ad_cache(mut self, ad_cache: AdCache) -> Self {
        self.ad_cache = ad_cache;
        self
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn tally(&self) -> Arc<RwLock<EngagementTally>> {
        Arc::clone(&self.tally)
    }

    /// Builds a feed of at most `target_length` items for `user_id`
    ///
    /// Store failures degrade (no history, empty catalog, no ads) rather
    /// than fail; only an empty user id is rejected.
    pub async fn generate_feed(&self, user_id: &str, target_length: usize) -> AppResult<FeedResponse> {
        if user_id.trim().is_empty() {
            return Err(AppError::InvalidInput("user id must not be empty".to_string()));
        }
        let now = Utc::now();

        let interactions = self.interactions_or_empty(user_id).await;
        let catalog = self.catalog_or_empty().await;
        self.reset_idle_history(user_id, now).await;
        let shown_ids = self.shown_ids_or_empty(user_id).await;
        let live_ads = self.ads_or_empty().await;

        let mut rng = match self.settings.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let composed = {
            let tally = self.tally.read().await;
            let inputs = FeedInputs {
                interactions: &interactions,
                catalog: &catalog,
                shown_ids: &shown_ids,
                ads: &live_ads,
                tally: &tally,
            };
            compose_feed(&inputs, target_length, &self.settings, now, &mut rng)
        };

        let ComposedFeed {
            mut response,
            without_ad,
            placement,
            emotion_loop,
            timed_out,
        } = composed;

        let mut ad_placed = false;
        if let Some(placement) = &placement {
            match self
                .ads
                .record_impression(
                    &placement.ad_id,
                    user_id,
                    placement.emotion_before,
                    placement.emotion_after,
                )
                .await
            {
                Ok(()) => ad_placed = true,
                Err(e) => {
                    tracing::warn!(ad_id = %placement.ad_id, error = %e, "Failed to record ad impression, dropping ad");
                    response.feed = without_ad;
                }
            }
        }

        let shown: Vec<String> = response
            .content_ids()
            .into_iter()
            .map(str::to_string)
            .collect();
        if !shown.is_empty() {
            if let Err(e) = self.history.record(user_id, &shown, now).await {
                tracing::warn!(user_id = %user_id, error = %e, "Failed to record shown history");
            }
        }

        tracing::info!(
            user_id = %user_id,
            feed_len = response.feed.len(),
            interactions = interactions.len(),
            current_emotion = ?response.current_emotion,
            dominant_emotion = %response.emotion_distribution.dominant(),
            peak_ad_index = ?response.peak_ad_index,
            ad_placed,
            emotion_loop = ?emotion_loop.map(|l| l.emotion),
            timed_out,
            "Feed generated"
        );

        Ok(response)
    }

    /// Stores an interaction and counts it toward content engagement
    pub async fn record_interaction(&self, interaction: Interaction) -> AppResult<()> {
        if interaction.user_id.trim().is_empty() || interaction.content_id.trim().is_empty() {
            return Err(AppError::InvalidInput(
                "user_id and content_id are required".to_string(),
            ));
        }

        let user_id = interaction.user_id.clone();
        let content_id = interaction.content_id.clone();
        let kind = interaction.kind;

        self.interactions.append(interaction).await?;
        self.tally.write().await.record(&content_id, kind);

        if kind == InteractionKind::AdClick {
            match self.ads.record_click(&content_id, &user_id).await {
                // CTR changed; reload ad metrics on the next feed
                Ok(()) => self.ad_cache.invalidate().await,
                Err(e) => tracing::warn!(ad_id = %content_id, error = %e, "Failed to record ad click"),
            }
        }

        tracing::debug!(user_id = %user_id, content_id = %content_id, kind = ?kind, "Interaction recorded");
        Ok(())
    }

    async fn interactions_or_empty(&self, user_id: &str) -> Vec<Interaction> {
        self.interactions
            .list_by_user(user_id)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(user_id = %user_id, error = %e, "Interactions unavailable, treating user as new");
                Vec::new()
            })
    }

    async fn catalog_or_empty(&self) -> Vec<ContentItem> {
        self.content.list_all().await.unwrap_or_else(|e| {
            tracing::error!(error = %e, "Content catalog unavailable");
            Vec::new()
        })
    }

    async fn shown_ids_or_empty(&self, user_id: &str) -> Vec<String> {
        self.history
            .recent_ids(user_id, self.settings.history_window, self.settings.history_max_ids)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(user_id = %user_id, error = %e, "Shown history unavailable");
                Vec::new()
            })
    }

    /// Clears shown history when the user has been idle too long
    async fn reset_idle_history(&self, user_id: &str, now: DateTime<Utc>) {
        let last = match self.history.last_activity(user_id).await {
            Ok(last) => last,
            Err(e) => {
                tracing::warn!(user_id = %user_id, error = %e, "Could not read last activity");
                return;
            }
        };

        if let Some(last) = last {
            if now - last > self.settings.history_idle_reset {
                tracing::debug!(user_id = %user_id, "Idle session, clearing shown history");
                if let Err(e) = self.history.clear(user_id).await {
                    tracing::warn!(user_id = %user_id, error = %e, "Failed to clear shown history");
                }
            }
        }
    }

    /// Live ads, served from the cache while it is fresh
    async fn ads_or_empty(&self) -> Arc<Vec<Ad>> {
        if let Some(ads) = self.ad_cache.get_fresh().await {
            return ads;
        }

        match self.ads.list_active().await {
            Ok(ads) => self.ad_cache.replace(ads).await,
            Err(e) => {
                tracing::warn!(error = %e, "Ads unavailable, serving feed without ad");
                Arc::new(Vec::new())
            }
        }
    }
}
