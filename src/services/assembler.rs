//! Fills a feed around the story arc
//!
//! The arc occupies the first slots. Remaining slots are filled from the
//! pool tiers by composite score, the diversity ceiling is enforced by
//! swapping items, and the tail after the arc is optionally shuffled.
//! Finally a few tail slots go to low-share emotions.

use rand::seq::SliceRandom;
use rand::Rng;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use std::time::Instant;

use crate::models::Emotion;
use crate::services::exploration;
use crate::services::loop_detector::EmotionLoop;
use crate::services::pools::{ContentPools, PoolCandidate};
use crate::services::scoring::RelevanceScorer;
use crate::services::story_arc::StoryArc;

#[derive(Debug, Clone)]
pub struct AssemblyParams {
    pub target_len: usize,
    /// Maximum share of the feed one emotion may hold
    pub diversity_ceiling: f64,
    /// Scoring stops once this instant passes
    pub deadline: Instant,
    pub shuffle_tail: bool,
    /// Seed one item per emotion before score-ordered filling
    pub cold_start: bool,
}

/// Assembled feed as catalog indices in display order
#[derive(Debug, Clone, Default)]
pub struct Assembly {
    pub items: Vec<usize>,
    /// Number of leading items that belong to the story arc
    pub arc_len: usize,
    pub timed_out: bool,
}

struct Context<'s, 'p, 'c, 'a> {
    pools: &'p ContentPools<'c, 'a>,
    scorer: &'s RelevanceScorer<'s>,
    arc_emotions: &'s [Emotion],
    emotion_loop: Option<&'s EmotionLoop>,
}

impl Context<'_, '_, '_, '_> {
    fn score(&self, index: usize) -> f64 {
        self.scorer.composite_or_zero(
            &self.pools.entries()[index],
            self.arc_emotions,
            self.emotion_loop,
        )
    }

    fn emotion(&self, index: usize) -> Emotion {
        self.pools.entries()[index].emotion
    }
}

pub fn assemble<R: Rng + ?Sized>(
    pools: &ContentPools<'_, '_>,
    arc: &StoryArc,
    scorer: &RelevanceScorer<'_>,
    emotion_loop: Option<&EmotionLoop>,
    params: &AssemblyParams,
    rng: &mut R,
) -> Assembly {
    let target = params.target_len;
    let ctx = Context {
        pools,
        scorer,
        arc_emotions: &arc.emotions,
        emotion_loop,
    };

    let mut feed: Vec<usize> = arc.items.iter().take(target).copied().collect();
    let arc_len = feed.len();
    let mut used: HashSet<usize> = feed.iter().copied().collect();

    if params.cold_start {
        seed_coverage(&ctx, &mut feed, &mut used, target, rng);
    }

    let mut timed_out = false;
    let needed = target.saturating_sub(feed.len());
    if needed > 0 {
        let candidates = pools.draw(needed, &used, target);
        let (ranked, expired) = rank(&ctx, candidates, params.deadline, rng);
        timed_out = expired;
        for index in ranked.into_iter().take(needed) {
            used.insert(index);
            feed.push(index);
        }
    }

    enforce_diversity(&ctx, &mut feed, arc_len, &used, params.diversity_ceiling, target);

    if params.shuffle_tail && feed.len() > arc_len {
        feed[arc_len..].shuffle(rng);
    }

    exploration::inject_low_share(&mut feed, arc_len, pools, scorer.distribution(), rng);

    Assembly {
        items: feed,
        arc_len,
        timed_out,
    }
}

/// Adds one item for every emotion not yet present, drawn at random from
/// the highest tier holding that emotion
fn seed_coverage<R: Rng + ?Sized>(
    ctx: &Context<'_, '_, '_, '_>,
    feed: &mut Vec<usize>,
    used: &mut HashSet<usize>,
    target: usize,
    rng: &mut R,
) {
    let candidates = ctx.pools.draw_all(used, target);

    for emotion in Emotion::ALL {
        if feed.len() >= target {
            break;
        }
        if feed.iter().any(|&i| ctx.emotion(i) == emotion) {
            continue;
        }

        let of_emotion: Vec<&PoolCandidate> = candidates
            .iter()
            .filter(|c| ctx.emotion(c.index) == emotion && !used.contains(&c.index))
            .collect();
        let Some(best_tier) = of_emotion.iter().map(|c| c.tier).min() else {
            continue;
        };
        let in_tier: Vec<usize> = of_emotion
            .iter()
            .filter(|c| c.tier == best_tier)
            .map(|c| c.index)
            .collect();

        if let Some(&index) = in_tier.choose(rng) {
            used.insert(index);
            feed.push(index);
        }
    }
}

/// Orders candidates by tier, then composite score descending
///
/// Exact ties are shuffled. Once the deadline passes, the remaining
/// candidates are left unscored in pool order behind the scored ones.
fn rank<R: Rng + ?Sized>(
    ctx: &Context<'_, '_, '_, '_>,
    candidates: Vec<PoolCandidate>,
    deadline: Instant,
    rng: &mut R,
) -> (Vec<usize>, bool) {
    let mut scored: Vec<(PoolCandidate, f64)> = Vec::with_capacity(candidates.len());
    let mut unscored: Vec<usize> = Vec::new();
    let mut timed_out = false;

    for candidate in candidates {
        if !timed_out && Instant::now() >= deadline {
            timed_out = true;
            tracing::warn!(scored = scored.len(), "Scoring deadline reached, keeping pool order for the rest");
        }
        if timed_out {
            unscored.push(candidate.index);
        } else {
            let score = ctx.score(candidate.index);
            scored.push((candidate, score));
        }
    }

    scored.sort_by(|a, b| {
        a.0.tier
            .cmp(&b.0.tier)
            .then_with(|| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal))
    });
    shuffle_ties(&mut scored, rng);

    let ranked = scored
        .into_iter()
        .map(|(c, _)| c.index)
        .chain(unscored)
        .collect();
    (ranked, timed_out)
}

/// Shuffles each run of candidates sharing tier and score
fn shuffle_ties<R: Rng + ?Sized>(scored: &mut [(PoolCandidate, f64)], rng: &mut R) {
    let mut start = 0;
    while start < scored.len() {
        let (tier, score) = (scored[start].0.tier, scored[start].1);
        let mut end = start + 1;
        while end < scored.len() && scored[end].0.tier == tier && scored[end].1 == score {
            end += 1;
        }
        if end - start > 1 {
            scored[start..end].shuffle(rng);
        }
        start = end;
    }
}

/// Largest count any emotion may reach in a feed of `len` items
pub fn diversity_limit(ceiling: f64, len: usize) -> usize {
    ((ceiling * len as f64).floor() as usize).max(1)
}

/// Swaps items until no emotion exceeds the ceiling or no alternative helps
///
/// The lowest-scored non-arc item of the over-represented emotion is
/// replaced by the best remaining item of the least represented emotion.
fn enforce_diversity(
    ctx: &Context<'_, '_, '_, '_>,
    feed: &mut [usize],
    arc_len: usize,
    used: &HashSet<usize>,
    ceiling: f64,
    target: usize,
) {
    if feed.is_empty() {
        return;
    }
    let limit = diversity_limit(ceiling, feed.len());
    let mut alternatives: Option<Vec<(PoolCandidate, f64)>> = None;

    loop {
        let mut counts: BTreeMap<Emotion, usize> = Emotion::ALL.iter().map(|e| (*e, 0)).collect();
        for &i in feed.iter() {
            *counts.entry(ctx.emotion(i)).or_insert(0) += 1;
        }

        let Some(offending) = counts
            .iter()
            .filter(|(_, c)| **c > limit)
            .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
            .map(|(e, _)| *e)
        else {
            return;
        };

        let Some(out_pos) = (arc_len..feed.len())
            .filter(|&pos| ctx.emotion(feed[pos]) == offending)
            .min_by(|&a, &b| {
                ctx.score(feed[a])
                    .partial_cmp(&ctx.score(feed[b]))
                    .unwrap_or(Ordering::Equal)
            })
        else {
            tracing::debug!(emotion = %offending, "Diversity ceiling exceeded by the story arc alone");
            return;
        };

        let pool = alternatives.get_or_insert_with(|| {
            ctx.pools
                .draw_all(used, target)
                .into_iter()
                .map(|c| (c, ctx.score(c.index)))
                .collect()
        });

        let replacement_emotion = counts
            .iter()
            .filter(|(e, c)| **e != offending && **c < limit)
            .filter(|(e, _)| pool.iter().any(|(c, _)| ctx.emotion(c.index) == **e))
            .min_by(|a, b| a.1.cmp(b.1).then_with(|| a.0.cmp(b.0)))
            .map(|(e, _)| *e);
        let Some(replacement_emotion) = replacement_emotion else {
            tracing::debug!(emotion = %offending, "No alternatives left to satisfy diversity ceiling");
            return;
        };

        let Some(pick) = pool
            .iter()
            .enumerate()
            .filter(|(_, (c, _))| ctx.emotion(c.index) == replacement_emotion)
            .min_by(|(_, a), (_, b)| {
                a.0.tier
                    .cmp(&b.0.tier)
                    .then_with(|| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal))
            })
            .map(|(pos, _)| pos)
        else {
            return;
        };

        let (replacement, _) = pool.remove(pick);
        feed[out_pos] = replacement.index;
    }
}
