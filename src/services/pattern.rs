//! Emotion affinity distribution from a user's interaction history
//!
//! Each interaction contributes `kind weight × confidence × recency`
//! to its emotion. Negative totals are clipped, the rest normalized, and
//! emotions the user disliked are dampened in a second pass.

use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeMap, BTreeSet};

use crate::error::{AppError, AppResult};
use crate::models::{Emotion, EmotionDistribution, Interaction, InteractionKind};
use crate::services::timestamp;

/// Multiplier for interactions whose age cannot be determined
const UNKNOWN_AGE_MULTIPLIER: f64 = 0.5;

/// Disliked emotions are shrunk by this factor...
const DISLIKE_SHRINK: f64 = 0.975;
/// ...and never keep more than this share
const DISLIKE_CAP: f64 = 0.5;

/// Recency multiplier: 2.0 within a day, 1.5 within a week, then decaying
/// by 0.1 per day down to 0.5
pub fn recency_multiplier(age: Option<Duration>) -> f64 {
    let Some(age) = age else {
        return UNKNOWN_AGE_MULTIPLIER;
    };

    if age <= Duration::hours(24) {
        2.0
    } else if age <= Duration::days(7) {
        1.5
    } else {
        let days = age.num_seconds() as f64 / 86_400.0;
        (1.0 - 0.1 * days).max(0.5)
    }
}

/// Computes the user's emotion distribution
///
/// Interactions with unrecognized emotions are skipped. Returns a uniform
/// distribution when nothing positive remains.
pub fn analyze(interactions: &[Interaction], now: DateTime<Utc>) -> AppResult<EmotionDistribution> {
    let mut weights: BTreeMap<Emotion, f64> = BTreeMap::new();
    let mut disliked: BTreeSet<Emotion> = BTreeSet::new();

    for interaction in interactions {
        let Some(emotion) = interaction.emotion() else {
            tracing::debug!(
                content_id = %interaction.content_id,
                emotion = %interaction.emotion,
                "Skipping interaction with unknown emotion"
            );
            continue;
        };

        let age = match timestamp::normalize_opt(interaction.timestamp.as_ref()) {
            Some(ts) => Some(now - ts),
            None => {
                tracing::warn!(
                    content_id = %interaction.content_id,
                    "Interaction timestamp unparseable, treating as old"
                );
                None
            }
        };

        let confidence = if interaction.confidence.is_finite() {
            interaction.confidence.clamp(0.0, 1.0)
        } else {
            0.5
        };

        let weight = interaction.kind.pattern_weight() * confidence * recency_multiplier(age);
        if !weight.is_finite() {
            return Err(AppError::Scoring(format!(
                "non-finite pattern weight for content {}",
                interaction.content_id
            )));
        }

        *weights.entry(emotion).or_insert(0.0) += weight;
        if interaction.kind == InteractionKind::Dislike {
            disliked.insert(emotion);
        }
    }

    let Some(distribution) = EmotionDistribution::from_weights(&weights) else {
        return Ok(EmotionDistribution::uniform());
    };

    Ok(dampen_disliked(&distribution, &disliked))
}

/// Boundary wrapper: any fault degrades to the uniform distribution
pub fn analyze_or_uniform(interactions: &[Interaction], now: DateTime<Utc>) -> EmotionDistribution {
    match analyze(interactions, now) {
        Ok(distribution) => distribution,
        Err(e) => {
            tracing::error!(error = %e, "Emotion pattern analysis failed, using uniform distribution");
            EmotionDistribution::uniform()
        }
    }
}

/// Shrinks disliked emotions and hands the freed share to the others
///
/// Freed mass goes to non-disliked emotions in proportion to their share,
/// or evenly across them when none holds any. When every emotion is
/// disliked the distribution is returned as is.
fn dampen_disliked(
    distribution: &EmotionDistribution,
    disliked: &BTreeSet<Emotion>,
) -> EmotionDistribution {
    if disliked.is_empty() || disliked.len() == Emotion::ALL.len() {
        return distribution.clone();
    }

    let mut shares: BTreeMap<Emotion, f64> = distribution.iter().collect();
    let mut freed = 0.0;
    for emotion in disliked {
        if let Some(share) = shares.get_mut(emotion) {
            let dampened = (*share * DISLIKE_SHRINK).min(DISLIKE_CAP);
            freed += *share - dampened;
            *share = dampened;
        }
    }

    let receivers: Vec<Emotion> = Emotion::ALL
        .iter()
        .copied()
        .filter(|e| !disliked.contains(e))
        .collect();
    let receiver_mass: f64 = receivers.iter().map(|e| shares[e]).sum();

    for emotion in &receivers {
        let bonus = if receiver_mass > 0.0 {
            freed * shares[emotion] / receiver_mass
        } else {
            freed / receivers.len() as f64
        };
        if let Some(share) = shares.get_mut(emotion) {
            *share += bonus;
        }
    }

    EmotionDistribution::from_weights(&shares).unwrap_or_else(|| distribution.clone())
}
