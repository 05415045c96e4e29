//! Ad selection and placement at the feed's emotional peak

use chrono::{DateTime, Duration, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use std::cmp::Ordering;
use std::collections::HashSet;

use crate::error::{AppError, AppResult};
use crate::models::{Ad, AdMetricKind, Emotion, FeedItem};
use crate::services::keywords;

/// Trailing window of metric events used for performance
pub const PERFORMANCE_WINDOW_DAYS: i64 = 30;

/// Ads above both thresholds are preferred over the top scorer
const PREFERRED_COMPOSITE: f64 = 0.7;
const PREFERRED_CTR: f64 = 0.02;

const EMOTION_MATCH_WEIGHT: f64 = 0.4;
const KEYWORD_WEIGHT: f64 = 0.3;
const PERFORMANCE_WEIGHT: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AdPerformance {
    pub impressions: u64,
    pub clicks: u64,
    pub ctr: f64,
    /// Share of impressions after which the viewer's emotion moved to the target
    pub change_ratio: f64,
    pub score: f64,
}

/// Performance over the trailing window ending at `now`
pub fn performance(ad: &Ad, now: DateTime<Utc>) -> AdPerformance {
    let cutoff = now - Duration::days(PERFORMANCE_WINDOW_DAYS);
    let target = ad.target_emotion();

    let mut perf = AdPerformance::default();
    let mut moved = 0u64;
    for event in ad.metrics.iter().filter(|e| e.timestamp >= cutoff && e.timestamp <= now) {
        match event.kind {
            AdMetricKind::Impression => {
                perf.impressions += 1;
                let changed = matches!(
                    (event.emotion_before, event.emotion_after),
                    (Some(before), Some(after)) if before != after && Some(after) == target
                );
                if changed {
                    moved += 1;
                }
            }
            AdMetricKind::Click => perf.clicks += 1,
            AdMetricKind::View => {}
        }
    }

    if perf.impressions > 0 {
        perf.ctr = perf.clicks as f64 / perf.impressions as f64;
        perf.change_ratio = moved as f64 / perf.impressions as f64;
    }
    let ctr_score = (10.0 * perf.ctr).min(1.0);
    perf.score = (0.7 * ctr_score + 0.3 * perf.change_ratio).clamp(0.0, 1.0);
    perf
}

#[derive(Debug, Clone)]
pub struct ScoredAd<'a> {
    pub ad: &'a Ad,
    pub composite: f64,
    pub performance: AdPerformance,
}

/// Scores an ad for the slot following an item with `preceding_emotion`
///
/// `context_keywords` is the user's recent keywords plus those of the
/// preceding item.
pub fn score_ad<'a>(
    ad: &'a Ad,
    preceding_emotion: Option<Emotion>,
    context_keywords: &HashSet<String>,
    now: DateTime<Utc>,
) -> AppResult<ScoredAd<'a>> {
    let emotion_match = match (ad.target_emotion(), preceding_emotion) {
        (Some(target), Some(preceding)) if target == preceding => 1.0,
        _ => 0.0,
    };
    let keyword_score = keywords::jaccard(&keywords::normalize(&ad.keywords), context_keywords);
    let performance = performance(ad, now);

    let composite = EMOTION_MATCH_WEIGHT * emotion_match
        + KEYWORD_WEIGHT * keyword_score
        + PERFORMANCE_WEIGHT * performance.score;

    if !composite.is_finite() {
        return Err(AppError::Scoring(format!("non-finite ad score for {}", ad.id)));
    }

    Ok(ScoredAd {
        ad,
        composite,
        performance,
    })
}

/// Picks the ad to show among live `ads`
///
/// A random proven performer (high composite and CTR) wins; otherwise the
/// top composite, ties going to higher priority and then lower id.
pub fn select_ad<'a, R: Rng + ?Sized>(
    ads: &'a [Ad],
    preceding_emotion: Option<Emotion>,
    context_keywords: &HashSet<String>,
    now: DateTime<Utc>,
    rng: &mut R,
) -> AppResult<Option<ScoredAd<'a>>> {
    let scored = ads
        .iter()
        .filter(|ad| ad.is_live_at(now))
        .map(|ad| score_ad(ad, preceding_emotion, context_keywords, now))
        .collect::<AppResult<Vec<_>>>()?;

    let preferred: Vec<&ScoredAd<'a>> = scored
        .iter()
        .filter(|s| s.composite > PREFERRED_COMPOSITE && s.performance.ctr > PREFERRED_CTR)
        .collect();
    if let Some(choice) = preferred.choose(rng) {
        return Ok(Some((*choice).clone()));
    }

    Ok(scored.into_iter().max_by(|a, b| {
        a.composite
            .partial_cmp(&b.composite)
            .unwrap_or(Ordering::Equal)
            .then_with(|| {
                a.ad.priority
                    .partial_cmp(&b.ad.priority)
                    .unwrap_or(Ordering::Equal)
            })
            .then_with(|| b.ad.id.cmp(&a.ad.id))
    }))
}

/// Where an ad landed and the emotions around it
#[derive(Debug, Clone, PartialEq)]
pub struct AdPlacement {
    pub ad_id: String,
    pub index: usize,
    pub emotion_before: Option<Emotion>,
    pub emotion_after: Option<Emotion>,
}

/// Where an ad may go in a composed feed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdSlot {
    pub peak: Option<usize>,
    /// Number of leading feed items that belong to the story arc
    pub arc_len: usize,
    pub target_len: usize,
}

/// Inserts one ad at the slot's peak, keeping the feed within `target_len`
///
/// The first `arc_len` items are the story arc and are never dropped. The
/// ad takes a slot, so trailing non-arc content is dropped when the feed
/// would grow past the target; if only arc content could make room, no ad
/// is placed. No-op when there is no valid peak or no eligible ad. On
/// error the feed is left untouched.
pub fn place_ad<R: Rng + ?Sized>(
    feed: &mut Vec<FeedItem>,
    slot: AdSlot,
    ads: &[Ad],
    context_keywords: &HashSet<String>,
    now: DateTime<Utc>,
    rng: &mut R,
) -> AppResult<Option<AdPlacement>> {
    let AdSlot {
        peak,
        arc_len,
        target_len,
    } = slot;
    let Some(peak) = peak else {
        return Ok(None);
    };
    if peak == 0 || peak >= feed.len() {
        return Ok(None);
    }

    // Content after the peak that is not part of the arc
    let droppable = feed.len().saturating_sub(arc_len.max(peak));
    let overflow = (feed.len() + 1).saturating_sub(target_len);
    if overflow > droppable {
        tracing::debug!(peak, arc_len, target_len, "No room for an ad without cutting the story arc");
        return Ok(None);
    }

    let emotion_before = feed[peak - 1].emotion();
    let Some(chosen) = select_ad(ads, emotion_before, context_keywords, now, rng)? else {
        return Ok(None);
    };

    tracing::debug!(
        ad_id = %chosen.ad.id,
        composite = chosen.composite,
        ctr = chosen.performance.ctr,
        index = peak,
        "Placing ad at peak"
    );

    feed.insert(
        peak,
        FeedItem::Ad {
            id: chosen.ad.id.clone(),
            emotion: chosen.ad.target_emotion(),
        },
    );

    feed.truncate(target_len);

    Ok(Some(AdPlacement {
        ad_id: chosen.ad.id.clone(),
        index: peak,
        emotion_before,
        emotion_after: feed.get(peak + 1).and_then(FeedItem::emotion),
    }))
}

/// Boundary wrapper: any failure leaves the feed without an ad
pub fn place_ad_or_skip<R: Rng + ?Sized>(
    feed: &mut Vec<FeedItem>,
    slot: AdSlot,
    ads: &[Ad],
    context_keywords: &HashSet<String>,
    now: DateTime<Utc>,
    rng: &mut R,
) -> Option<AdPlacement> {
    match place_ad(feed, slot, ads, context_keywords, now, rng) {
        Ok(placement) => placement,
        Err(e) => {
            tracing::warn!(error = %e, "Ad placement failed, serving feed without ad");
            None
        }
    }
}
