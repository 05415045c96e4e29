//! Emotion-to-emotion transitions, global and per user

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use crate::models::{Emotion, Interaction};
use crate::services::timestamp;

/// Population-level transition probabilities, rows and columns in category order
const GLOBAL_TRANSITIONS: [[f64; 6]; 6] = [
    // Sadness
    [0.6, 0.1, 0.1, 0.05, 0.1, 0.05],
    // Joy
    [0.1, 0.6, 0.1, 0.1, 0.05, 0.05],
    // Love
    [0.1, 0.1, 0.6, 0.05, 0.1, 0.05],
    // Anger
    [0.1, 0.1, 0.05, 0.6, 0.1, 0.05],
    // Fear
    [0.1, 0.1, 0.05, 0.1, 0.6, 0.05],
    // Surprise
    [0.1, 0.2, 0.1, 0.1, 0.1, 0.4],
];

pub fn global_probability(from: Emotion, to: Emotion) -> f64 {
    GLOBAL_TRANSITIONS[from.index()][to.index()]
}

/// Interactions with both a resolvable timestamp and emotion, oldest first
///
/// Sorting is stable so equal timestamps keep input order.
pub fn timeline(interactions: &[Interaction]) -> Vec<(DateTime<Utc>, Emotion)> {
    let mut events: Vec<(DateTime<Utc>, Emotion)> = interactions
        .iter()
        .filter_map(|i| {
            let emotion = i.emotion()?;
            let at = timestamp::normalize_opt(i.timestamp.as_ref())?;
            Some((at, emotion))
        })
        .collect();
    events.sort_by_key(|(at, _)| *at);
    events
}

/// Personalized emotion-to-emotion transition counts
#[derive(Debug, Clone, Default)]
pub struct TransitionModel {
    counts: BTreeMap<(Emotion, Emotion), u32>,
    current: Option<Emotion>,
}

impl TransitionModel {
    /// Counts every consecutive pair in time order, self-pairs included
    pub fn from_interactions(interactions: &[Interaction]) -> Self {
        let events = timeline(interactions);
        let mut counts = BTreeMap::new();

        for pair in events.windows(2) {
            *counts.entry((pair[0].1, pair[1].1)).or_insert(0) += 1;
        }

        Self {
            counts,
            current: events.last().map(|(_, emotion)| *emotion),
        }
    }

    pub fn count(&self, from: Emotion, to: Emotion) -> u32 {
        self.counts.get(&(from, to)).copied().unwrap_or(0)
    }

    pub fn counts(&self) -> &BTreeMap<(Emotion, Emotion), u32> {
        &self.counts
    }

    /// Emotion of the most recent timestamped interaction
    pub fn current_emotion(&self) -> Option<Emotion> {
        self.current
    }

    /// Most likely emotion to follow `from`, never one of `excluding`
    ///
    /// Uses the user's own transitions when any qualify, otherwise the
    /// global table. Ties go to the earlier category.
    pub fn next_emotion(&self, from: Emotion, excluding: &[Emotion]) -> Option<Emotion> {
        let personalized = Emotion::ALL
            .iter()
            .copied()
            .filter(|to| !excluding.contains(to))
            .map(|to| (to, self.count(from, to)))
            .filter(|(_, count)| *count > 0)
            .fold(None, |best: Option<(Emotion, u32)>, (to, count)| match best {
                Some((_, best_count)) if best_count >= count => best,
                _ => Some((to, count)),
            });

        if let Some((to, _)) = personalized {
            return Some(to);
        }

        Emotion::ALL
            .iter()
            .copied()
            .filter(|to| !excluding.contains(to))
            .fold(None, |best: Option<(Emotion, f64)>, to| {
                let p = global_probability(from, to);
                match best {
                    Some((_, best_p)) if best_p >= p => best,
                    _ => Some((to, p)),
                }
            })
            .map(|(to, _)| to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{InteractionKind, RawTimestamp};
    use chrono::Duration;

    fn sequence(emotions: &[&str]) -> Vec<Interaction> {
        let start = Utc::now() - Duration::hours(emotions.len() as i64);
        emotions
            .iter()
            .enumerate()
            .map(|(i, e)| Interaction {
                user_id: "u1".to_string(),
                content_id: format!("c{}", i),
                emotion: e.to_string(),
                kind: InteractionKind::View,
                confidence: 0.5,
                timestamp: Some(RawTimestamp::from(start + Duration::hours(i as i64))),
            })
            .collect()
    }

    #[test]
    fn test_global_rows_sum_to_one() {
        for from in Emotion::ALL {
            let total: f64 = Emotion::ALL.iter().map(|to| global_probability(from, *to)).sum();
            assert!((total - 1.0).abs() < 1e-9, "row {} sums to {}", from, total);
        }
    }

    #[test]
    fn test_counts_consecutive_pairs() {
        let model = TransitionModel::from_interactions(&sequence(&["joy", "fear", "joy", "fear", "love"]));

        assert_eq!(model.count(Emotion::Joy, Emotion::Fear), 2);
        assert_eq!(model.count(Emotion::Fear, Emotion::Joy), 1);
        assert_eq!(model.count(Emotion::Fear, Emotion::Love), 1);
        assert_eq!(model.counts().len(), 3);
        assert_eq!(model.current_emotion(), Some(Emotion::Love));
    }

    #[test]
    fn test_sorts_by_timestamp_before_counting() {
        let mut interactions = sequence(&["joy", "anger"]);
        interactions.reverse();
        let model = TransitionModel::from_interactions(&interactions);

        assert_eq!(model.count(Emotion::Joy, Emotion::Anger), 1);
        assert_eq!(model.count(Emotion::Anger, Emotion::Joy), 0);
        assert_eq!(model.current_emotion(), Some(Emotion::Anger));
    }

    #[test]
    fn test_self_pairs_are_counted() {
        let model = TransitionModel::from_interactions(&sequence(&["fear", "fear"]));
        assert_eq!(model.count(Emotion::Fear, Emotion::Fear), 1);
    }

    #[test]
    fn test_untimed_and_unknown_entries_are_dropped() {
        let mut interactions = sequence(&["joy", "boredom", "fear"]);
        interactions[2].timestamp = Some(RawTimestamp::Text("not a date".to_string()));
        let model = TransitionModel::from_interactions(&interactions);

        assert!(model.counts().is_empty());
        assert_eq!(model.current_emotion(), Some(Emotion::Joy));
    }

    #[test]
    fn test_next_prefers_highest_personal_count() {
        let interactions = sequence(&[
            "sadness", "joy", "sadness", "joy", "sadness", "joy", "sadness", "joy", "sadness",
            "joy", "sadness", "love", "sadness",
        ]);
        let model = TransitionModel::from_interactions(&interactions);

        assert_eq!(model.count(Emotion::Sadness, Emotion::Joy), 5);
        assert_eq!(model.count(Emotion::Sadness, Emotion::Love), 1);
        assert_eq!(model.next_emotion(Emotion::Sadness, &[]), Some(Emotion::Joy));
        assert_eq!(
            model.next_emotion(Emotion::Sadness, &[Emotion::Joy]),
            Some(Emotion::Love)
        );
    }

    #[test]
    fn test_next_personal_tie_goes_to_category_order() {
        let model = TransitionModel::from_interactions(&sequence(&["anger", "fear", "anger", "joy"]));
        // anger->fear and anger->joy both seen once; joy comes first
        assert_eq!(model.next_emotion(Emotion::Anger, &[]), Some(Emotion::Joy));
    }

    #[test]
    fn test_next_falls_back_to_global_table() {
        let model = TransitionModel::default();
        assert_eq!(model.next_emotion(Emotion::Surprise, &[]), Some(Emotion::Surprise));
        assert_eq!(
            model.next_emotion(Emotion::Surprise, &[Emotion::Surprise]),
            Some(Emotion::Joy)
        );
        // Joy row after excluding joy: sadness, love, anger tie at 0.1
        assert_eq!(model.next_emotion(Emotion::Joy, &[Emotion::Joy]), Some(Emotion::Sadness));
    }

    #[test]
    fn test_next_with_everything_excluded() {
        let model = TransitionModel::default();
        assert_eq!(model.next_emotion(Emotion::Joy, &Emotion::ALL), None);
    }
}
