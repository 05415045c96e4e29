//! Story arc: the 1-3 step emotion sequence a feed opens with

use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashSet;

use crate::models::Emotion;
use crate::services::pools::ContentPools;
use crate::services::transition::TransitionModel;

/// Longest arc the planner produces
pub const MAX_ARC_STEPS: usize = 3;

/// Planned opening of a feed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoryArc {
    /// Emotion sequence the plan aimed for, up to three steps
    pub emotions: Vec<Emotion>,
    /// Realized items, by catalog index; may be shorter than `emotions`
    pub items: Vec<usize>,
    /// Feed position right after the most significant transition
    pub peak_index: Option<usize>,
}

impl StoryArc {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Emotions of the realized items
    pub fn realized_emotions(&self) -> &[Emotion] {
        &self.emotions[..self.items.len()]
    }
}

/// Emotion sequence starting at the user's current emotion
pub fn plan_emotions(model: &TransitionModel) -> Vec<Emotion> {
    let Some(current) = model.current_emotion() else {
        return Vec::new();
    };

    let mut emotions = vec![current];
    let Some(next1) = model.next_emotion(current, &[]) else {
        return emotions;
    };
    emotions.push(next1);

    let next2 = match model.next_emotion(next1, &[current]) {
        Some(e) if e == next1 => model.next_emotion(next1, &[current, next1]),
        other => other,
    };
    if let Some(next2) = next2 {
        emotions.push(next2);
    }

    emotions
}

/// Arc items that fit a feed of `target_len` with room for the ad
///
/// Keeps one content item behind the peak slot, so an ad placed at the
/// peak never forces arc content out of the feed.
pub fn arc_capacity(target_len: usize) -> usize {
    target_len.saturating_sub(2).clamp(1, MAX_ARC_STEPS)
}

/// Plans the arc and picks one unseen item per step, at most `max_items`
///
/// Items sharing keywords with the user's recent interests are preferred.
/// The arc stops at the first step with no matching item.
pub fn plan<R: Rng + ?Sized>(
    model: &TransitionModel,
    pools: &ContentPools<'_, '_>,
    recent_keywords: &HashSet<String>,
    max_items: usize,
    rng: &mut R,
) -> StoryArc {
    let emotions = plan_emotions(model);
    let unseen = pools.unseen();
    let entries = pools.entries();
    let mut used: HashSet<usize> = HashSet::new();
    let mut items = Vec::with_capacity(emotions.len());

    for emotion in emotions.iter().take(max_items) {
        let matches: Vec<usize> = unseen
            .iter()
            .copied()
            .filter(|i| !used.contains(i) && entries[*i].emotion == *emotion)
            .collect();

        let on_topic: Vec<usize> = matches
            .iter()
            .copied()
            .filter(|i| !entries[*i].keywords.is_disjoint(recent_keywords))
            .collect();

        let choice = if on_topic.is_empty() {
            matches.choose(rng)
        } else {
            on_topic.choose(rng)
        };

        match choice {
            Some(&index) => {
                used.insert(index);
                items.push(index);
            }
            None => break,
        }
    }

    let mut arc = StoryArc {
        emotions,
        items,
        peak_index: None,
    };
    arc.peak_index = peak_index(model, arc.realized_emotions());
    arc
}

/// Position right after the item reached by the strongest realized transition
///
/// Ties keep the earlier transition. A single-item arc peaks at 1.
pub fn peak_index(model: &TransitionModel, realized: &[Emotion]) -> Option<usize> {
    match realized.len() {
        0 => None,
        1 => Some(1),
        _ => {
            let mut best_step = 0;
            let mut best_count = 0;
            for (step, pair) in realized.windows(2).enumerate() {
                let count = model.count(pair[0], pair[1]);
                if step == 0 || count > best_count {
                    best_step = step;
                    best_count = count;
                }
            }
            // transition `step` reaches item `step + 1`
            Some(best_step + 2)
        }
    }
}
