//! Exploration slots for emotions the user rarely or never meets
//!
//! After a feed is filled, a small share of its non-arc slots is handed to
//! unseen items of the lowest-share emotions, spread evenly over the tail.

use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashSet;

use crate::models::{Emotion, EmotionDistribution};
use crate::services::pools::ContentPools;

/// Share of the feed normally given to exploration
pub const EXPLORE_RATIO: f64 = 0.1;
/// Upper bound on the explored share
pub const EXPLORE_MAX_RATIO: f64 = 0.2;

/// Emotions holding the lowest share, plus every emotion with no share
///
/// Empty for a uniform distribution, which carries no preference to
/// explore away from.
pub fn target_emotions(distribution: &EmotionDistribution) -> Vec<Emotion> {
    if distribution.is_uniform() {
        return Vec::new();
    }
    let lowest = Emotion::ALL
        .iter()
        .map(|e| distribution.get(*e))
        .fold(f64::INFINITY, f64::min);

    Emotion::ALL
        .iter()
        .copied()
        .filter(|e| {
            let share = distribution.get(*e);
            share <= lowest || share <= 0.0
        })
        .collect()
}

/// Number of slots to explore in a feed of `feed_len`
pub fn injection_count(feed_len: usize, candidates: usize) -> usize {
    let cap = (feed_len as f64 * EXPLORE_MAX_RATIO).floor() as usize;
    let wanted = ((feed_len as f64 * EXPLORE_RATIO).floor() as usize).max(1);
    cap.min(wanted).min(candidates)
}

/// Evenly spaced positions in the tail that starts at `arc_len`
pub fn spread_positions(arc_len: usize, feed_len: usize, count: usize) -> Vec<usize> {
    let tail = feed_len.saturating_sub(arc_len);
    if count == 0 || tail == 0 {
        return Vec::new();
    }
    let step = (tail / (count + 1)).max(1);

    let mut positions: Vec<usize> = (1..=count)
        .map(|i| arc_len + (i * step).min(tail - 1))
        .collect();
    positions.dedup();
    positions
}

/// Replaces evenly spread tail items with unseen low-share emotion items
///
/// Positions already holding a target emotion are left alone. Returns the
/// number of items swapped in.
pub fn inject_low_share<R: Rng + ?Sized>(
    feed: &mut [usize],
    arc_len: usize,
    pools: &ContentPools<'_, '_>,
    distribution: &EmotionDistribution,
    rng: &mut R,
) -> usize {
    let targets = target_emotions(distribution);
    if targets.is_empty() {
        return 0;
    }

    let entries = pools.entries();
    let in_feed: HashSet<usize> = feed.iter().copied().collect();
    let mut candidates: Vec<usize> = (0..entries.len())
        .filter(|i| !in_feed.contains(i) && !pools.is_shown(*i))
        .filter(|i| targets.contains(&entries[*i].emotion))
        .collect();

    let count = injection_count(feed.len(), candidates.len());
    if count == 0 {
        return 0;
    }
    candidates.shuffle(rng);
    let mut picks = candidates.into_iter();

    let mut injected = 0;
    for pos in spread_positions(arc_len, feed.len(), count) {
        if targets.contains(&entries[feed[pos]].emotion) {
            continue;
        }
        let Some(pick) = picks.next() else {
            break;
        };
        feed[pos] = pick;
        injected += 1;
    }

    if injected > 0 {
        tracing::debug!(injected, targets = ?targets, "Injected low-share emotions");
    }
    injected
}
