//! Detection of emotion loops in recent engagement

use std::collections::BTreeMap;

use crate::models::{Emotion, Interaction};
use crate::services::transition::timeline;

/// Number of most recent interactions inspected
pub const LOOP_WINDOW: usize = 10;

/// Share of the window one emotion must hold to count as a loop
pub const LOOP_THRESHOLD: f64 = 0.8;

/// Fill-score multiplier for items that counter an active loop
pub const LOOP_BREAK_BOOST: f64 = 1.3;

/// A user repeatedly engaging with the same emotion
#[derive(Debug, Clone, PartialEq)]
pub struct EmotionLoop {
    pub emotion: Emotion,
    /// Share of the window held by `emotion`
    pub share: f64,
    /// Consecutive trailing interactions with `emotion`
    pub streak: usize,
}

impl EmotionLoop {
    /// Whether `candidate` counterbalances the looping emotion
    pub fn is_broken_by(&self, candidate: Emotion) -> bool {
        self.emotion.opposites().contains(&candidate)
    }
}

pub fn detect(interactions: &[Interaction]) -> Option<EmotionLoop> {
    let events = timeline(interactions);
    if events.len() < LOOP_WINDOW {
        return None;
    }

    let window = &events[events.len() - LOOP_WINDOW..];
    let mut counts: BTreeMap<Emotion, usize> = BTreeMap::new();
    for (_, emotion) in window {
        *counts.entry(*emotion).or_insert(0) += 1;
    }

    // BTreeMap iterates in category order, so ties keep the earlier emotion
    let (emotion, count) = counts
        .into_iter()
        .fold(None, |best: Option<(Emotion, usize)>, (e, c)| match best {
            Some((_, best_c)) if best_c >= c => best,
            _ => Some((e, c)),
        })?;

    let share = count as f64 / LOOP_WINDOW as f64;
    if share < LOOP_THRESHOLD {
        return None;
    }

    let streak = events
        .iter()
        .rev()
        .take_while(|(_, e)| *e == emotion)
        .count();

    tracing::debug!(emotion = %emotion, share, streak, "Emotion loop detected");

    Some(EmotionLoop {
        emotion,
        share,
        streak,
    })
}
