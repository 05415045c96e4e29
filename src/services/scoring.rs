//! Relevance and composite scoring of feed candidates

use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;

use crate::error::{AppError, AppResult};
use crate::models::{Emotion, EmotionDistribution};
use crate::services::engagement::EngagementTally;
use crate::services::keywords;
use crate::services::loop_detector::{EmotionLoop, LOOP_BREAK_BOOST};
use crate::services::pools::CatalogEntry;

/// Weights of the slot-filling composite
const PATTERN_WEIGHT: f64 = 0.4;
const RELEVANCE_WEIGHT: f64 = 0.3;
const RECENCY_WEIGHT: f64 = 0.15;
const ARC_WEIGHT: f64 = 0.1;
const ARC_BONUS: f64 = 0.05;

/// Recency bucket of a publish time: 1.0 / 0.7 / 0.4 / 0.2 for a day,
/// a week, a month, older (or unknown)
pub fn recency_bucket(published_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> f64 {
    let Some(published_at) = published_at else {
        return 0.2;
    };

    let age = now - published_at;
    if age <= Duration::hours(24) {
        1.0
    } else if age <= Duration::days(7) {
        0.7
    } else if age <= Duration::days(30) {
        0.4
    } else {
        0.2
    }
}

/// Scores catalog entries against a user's profile
///
/// Holds only borrowed inputs; identical inputs always give identical
/// scores.
pub struct RelevanceScorer<'a> {
    distribution: &'a EmotionDistribution,
    tally: &'a EngagementTally,
    recent_keywords: &'a HashSet<String>,
    keyword_weight: f64,
    now: DateTime<Utc>,
}

impl<'a> RelevanceScorer<'a> {
    pub fn new(
        distribution: &'a EmotionDistribution,
        tally: &'a EngagementTally,
        recent_keywords: &'a HashSet<String>,
        keyword_weight: f64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            distribution,
            tally,
            recent_keywords,
            keyword_weight,
            now,
        }
    }

    pub fn distribution(&self) -> &EmotionDistribution {
        self.distribution
    }

    /// Emotion affinity scaled by engagement, blended with keyword overlap
    pub fn relevance(&self, entry: &CatalogEntry<'_>) -> AppResult<f64> {
        let base = self.distribution.get(entry.emotion) * (1.0 + self.tally.boost(entry.id()));
        let keyword_score = keywords::jaccard(&entry.keywords, self.recent_keywords);
        let score = base * (1.0 - self.keyword_weight) + keyword_score * self.keyword_weight;

        finite(score, entry).map(|s| s.clamp(0.0, 1.0))
    }

    /// Slot-filling score
    ///
    /// Items countering an active emotion loop are boosted.
    pub fn composite(
        &self,
        entry: &CatalogEntry<'_>,
        arc_emotions: &[Emotion],
        emotion_loop: Option<&EmotionLoop>,
    ) -> AppResult<f64> {
        let arc_bonus = if arc_emotions.contains(&entry.emotion) {
            ARC_BONUS
        } else {
            0.0
        };

        let mut score = PATTERN_WEIGHT * self.distribution.get(entry.emotion)
            + RELEVANCE_WEIGHT * self.relevance(entry)?
            + RECENCY_WEIGHT * recency_bucket(entry.published_at, self.now)
            + ARC_WEIGHT * arc_bonus;

        if emotion_loop.is_some_and(|l| l.is_broken_by(entry.emotion)) {
            score *= LOOP_BREAK_BOOST;
        }

        finite(score, entry)
    }

    /// Boundary wrapper: a faulty score ranks the entry last
    pub fn composite_or_zero(
        &self,
        entry: &CatalogEntry<'_>,
        arc_emotions: &[Emotion],
        emotion_loop: Option<&EmotionLoop>,
    ) -> f64 {
        match self.composite(entry, arc_emotions, emotion_loop) {
            Ok(score) => score,
            Err(e) => {
                tracing::warn!(content_id = %entry.id(), error = %e, "Scoring failed, ranking item last");
                0.0
            }
        }
    }
}

fn finite(score: f64, entry: &CatalogEntry<'_>) -> AppResult<f64> {
    if score.is_finite() {
        Ok(score)
    } else {
        Err(AppError::Scoring(format!("non-finite score for {}", entry.id())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ContentItem, InteractionKind};
    use std::collections::BTreeMap;

    fn content(id: &str, emotion: &str) -> ContentItem {
        ContentItem {
            id: id.to_string(),
            emotion: emotion.to_string(),
            published_at: None,
            likes: 0,
            comments: 0,
            views: 0,
            body: String::new(),
            keywords: vec![],
            topic: None,
        }
    }

    fn entry<'a>(item: &'a ContentItem, keywords: &[&str], age: Option<Duration>) -> CatalogEntry<'a> {
        CatalogEntry {
            item,
            emotion: item.emotion().unwrap(),
            published_at: age.map(|a| Utc::now() - a),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        }
    }

    fn joy_heavy() -> EmotionDistribution {
        let mut weights = BTreeMap::new();
        weights.insert(Emotion::Joy, 0.8);
        weights.insert(Emotion::Fear, 0.2);
        EmotionDistribution::from_weights(&weights).unwrap()
    }

    #[test]
    fn test_recency_buckets() {
        let now = Utc::now();
        assert_eq!(recency_bucket(Some(now - Duration::hours(3)), now), 1.0);
        assert_eq!(recency_bucket(Some(now - Duration::days(3)), now), 0.7);
        assert_eq!(recency_bucket(Some(now - Duration::days(20)), now), 0.4);
        assert_eq!(recency_bucket(Some(now - Duration::days(200)), now), 0.2);
        assert_eq!(recency_bucket(None, now), 0.2);
    }

    #[test]
    fn test_relevance_follows_distribution() {
        let dist = joy_heavy();
        let tally = EngagementTally::new();
        let recent = HashSet::new();
        let scorer = RelevanceScorer::new(&dist, &tally, &recent, 0.3, Utc::now());

        let joy = content("c1", "joy");
        let fear = content("c2", "fear");
        let joy_score = scorer.relevance(&entry(&joy, &[], None)).unwrap();
        let fear_score = scorer.relevance(&entry(&fear, &[], None)).unwrap();

        assert!((joy_score - 0.8 * 0.7).abs() < 1e-12);
        assert!(joy_score > fear_score);
    }

    #[test]
    fn test_keyword_overlap_and_engagement_raise_relevance() {
        let dist = EmotionDistribution::uniform();
        let mut tally = EngagementTally::new();
        tally.record("c2", InteractionKind::Create);
        let recent: HashSet<String> = ["beach".to_string(), "summer".to_string()].into_iter().collect();
        let scorer = RelevanceScorer::new(&dist, &tally, &recent, 0.3, Utc::now());

        let plain = content("c1", "joy");
        let engaged = content("c2", "joy");
        let plain_score = scorer.relevance(&entry(&plain, &[], None)).unwrap();
        let engaged_score = scorer.relevance(&entry(&engaged, &[], None)).unwrap();
        let keyword_score = scorer.relevance(&entry(&plain, &["beach", "summer"], None)).unwrap();

        assert!(engaged_score > plain_score);
        assert!(keyword_score > plain_score);
    }

    #[test]
    fn test_scorer_is_pure() {
        let dist = joy_heavy();
        let mut tally = EngagementTally::new();
        tally.record("c1", InteractionKind::Like);
        let recent: HashSet<String> = ["city".to_string()].into_iter().collect();
        let now = Utc::now();
        let scorer = RelevanceScorer::new(&dist, &tally, &recent, 0.3, now);

        let item = content("c1", "joy");
        let e = entry(&item, &["city", "night"], Some(Duration::days(2)));
        let arc = [Emotion::Joy];

        let first = scorer.composite(&e, &arc, None).unwrap();
        for _ in 0..5 {
            assert_eq!(scorer.composite(&e, &arc, None).unwrap(), first);
        }
    }

    #[test]
    fn test_arc_membership_adds_bonus() {
        let dist = EmotionDistribution::uniform();
        let tally = EngagementTally::new();
        let recent = HashSet::new();
        let scorer = RelevanceScorer::new(&dist, &tally, &recent, 0.3, Utc::now());

        let item = content("c1", "love");
        let e = entry(&item, &[], None);
        let outside = scorer.composite(&e, &[Emotion::Joy], None).unwrap();
        let inside = scorer.composite(&e, &[Emotion::Love], None).unwrap();
        assert!((inside - outside - ARC_WEIGHT * ARC_BONUS).abs() < 1e-12);
    }

    #[test]
    fn test_loop_breakers_are_boosted() {
        let dist = EmotionDistribution::uniform();
        let tally = EngagementTally::new();
        let recent = HashSet::new();
        let scorer = RelevanceScorer::new(&dist, &tally, &recent, 0.3, Utc::now());
        let stuck = EmotionLoop {
            emotion: Emotion::Sadness,
            share: 0.9,
            streak: 9,
        };

        let joy = content("c1", "joy");
        let anger = content("c2", "anger");
        let e_joy = entry(&joy, &[], None);
        let e_anger = entry(&anger, &[], None);

        let boosted = scorer.composite(&e_joy, &[], Some(&stuck)).unwrap();
        let plain = scorer.composite(&e_joy, &[], None).unwrap();
        assert!((boosted - plain * LOOP_BREAK_BOOST).abs() < 1e-12);
        assert_eq!(
            scorer.composite(&e_anger, &[], Some(&stuck)).unwrap(),
            scorer.composite(&e_anger, &[], None).unwrap()
        );
    }

    #[test]
    fn test_non_finite_weight_degrades_to_zero() {
        let dist = EmotionDistribution::uniform();
        let tally = EngagementTally::new();
        let recent = HashSet::new();
        let scorer = RelevanceScorer::new(&dist, &tally, &recent, f64::NAN, Utc::now());

        let item = content("c1", "joy");
        let e = entry(&item, &[], None);
        assert!(scorer.composite(&e, &[], None).is_err());
        assert_eq!(scorer.composite_or_zero(&e, &[], None), 0.0);
    }
}
