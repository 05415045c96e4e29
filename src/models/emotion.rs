use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Display;

/// Fixed set of affect labels attached to interactions and content items
///
/// Declaration order is significant: it is the table order used to break
/// ties in transition lookups and the iteration order of distributions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Sadness,
    Joy,
    Love,
    Anger,
    Fear,
    Surprise,
}

impl Emotion {
    pub const ALL: [Emotion; 6] = [
        Emotion::Sadness,
        Emotion::Joy,
        Emotion::Love,
        Emotion::Anger,
        Emotion::Fear,
        Emotion::Surprise,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Emotion::Sadness => "sadness",
            Emotion::Joy => "joy",
            Emotion::Love => "love",
            Emotion::Anger => "anger",
            Emotion::Fear => "fear",
            Emotion::Surprise => "surprise",
        }
    }

    /// Position in the fixed category order
    pub fn index(&self) -> usize {
        *self as usize
    }

    /// Resolves a raw label to a category
    ///
    /// Accepts the bare English name in any case, and labels that carry the
    /// English name in parentheses (e.g. `"Neşe (Joy)"`).
    pub fn from_label(label: &str) -> Option<Self> {
        let trimmed = label.trim();
        let name = match (trimmed.rfind('('), trimmed.rfind(')')) {
            (Some(open), Some(close)) if open < close => &trimmed[open + 1..close],
            _ => trimmed,
        };

        match name.trim().to_lowercase().as_str() {
            "sadness" => Some(Emotion::Sadness),
            "joy" => Some(Emotion::Joy),
            "love" => Some(Emotion::Love),
            "anger" => Some(Emotion::Anger),
            "fear" => Some(Emotion::Fear),
            "surprise" => Some(Emotion::Surprise),
            _ => None,
        }
    }

    /// Emotions that counterbalance this one when a user is stuck in it
    pub fn opposites(&self) -> &'static [Emotion] {
        match self {
            Emotion::Sadness => &[Emotion::Joy, Emotion::Love],
            Emotion::Joy => &[Emotion::Sadness, Emotion::Fear],
            Emotion::Love => &[Emotion::Anger, Emotion::Fear],
            Emotion::Anger => &[Emotion::Love, Emotion::Joy],
            Emotion::Fear => &[Emotion::Joy, Emotion::Love],
            Emotion::Surprise => &[Emotion::Sadness, Emotion::Fear],
        }
    }
}

impl Display for Emotion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Normalized affinity over every emotion category
///
/// Values are non-negative and sum to 1 once built through
/// [`EmotionDistribution::from_weights`] or [`EmotionDistribution::uniform`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionDistribution(BTreeMap<Emotion, f64>);

impl EmotionDistribution {
    pub fn uniform() -> Self {
        let share = 1.0 / Emotion::ALL.len() as f64;
        Self(Emotion::ALL.iter().map(|&e| (e, share)).collect())
    }

    /// Normalizes raw weights; negative or non-finite weights count as zero
    ///
    /// Returns `None` when nothing positive remains to normalize.
    pub fn from_weights(weights: &BTreeMap<Emotion, f64>) -> Option<Self> {
        let clipped: BTreeMap<Emotion, f64> = Emotion::ALL
            .iter()
            .map(|e| {
                let w = weights.get(e).copied().unwrap_or(0.0);
                (*e, if w.is_finite() && w > 0.0 { w } else { 0.0 })
            })
            .collect();

        let total: f64 = clipped.values().sum();
        if total <= 0.0 || !total.is_finite() {
            return None;
        }

        Some(Self(
            clipped.into_iter().map(|(e, w)| (e, w / total)).collect(),
        ))
    }

    pub fn get(&self, emotion: Emotion) -> f64 {
        self.0.get(&emotion).copied().unwrap_or(0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Emotion, f64)> + '_ {
        self.0.iter().map(|(e, w)| (*e, *w))
    }

    pub fn total(&self) -> f64 {
        self.0.values().sum()
    }

    /// Highest-weight emotion; ties go to the earlier category
    pub fn dominant(&self) -> Emotion {
        let mut best = Emotion::ALL[0];
        let mut best_weight = f64::MIN;
        for (emotion, weight) in self.iter() {
            if weight > best_weight {
                best = emotion;
                best_weight = weight;
            }
        }
        best
    }

    pub fn is_uniform(&self) -> bool {
        let share = 1.0 / Emotion::ALL.len() as f64;
        self.0.values().all(|w| (w - share).abs() < 1e-12)
    }
}

impl Default for EmotionDistribution {
    fn default() -> Self {
        Self::uniform()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_label_accepts_plain_and_decorated_names() {
        assert_eq!(Emotion::from_label("joy"), Some(Emotion::Joy));
        assert_eq!(Emotion::from_label("  Fear "), Some(Emotion::Fear));
        assert_eq!(Emotion::from_label("Neşe (Joy)"), Some(Emotion::Joy));
        assert_eq!(Emotion::from_label("Şaşkınlık (Surprise)"), Some(Emotion::Surprise));
    }

    #[test]
    fn test_from_label_rejects_unknown() {
        assert_eq!(Emotion::from_label("nötr"), None);
        assert_eq!(Emotion::from_label(""), None);
        assert_eq!(Emotion::from_label("(boredom)"), None);
    }

    #[test]
    fn test_emotion_serialization() {
        let json = serde_json::to_string(&Emotion::Surprise).unwrap();
        assert_eq!(json, "\"surprise\"");
    }

    #[test]
    fn test_uniform_distribution() {
        let dist = EmotionDistribution::uniform();
        assert!(dist.is_uniform());
        assert!((dist.total() - 1.0).abs() < 1e-12);
        assert_eq!(dist.iter().count(), 6);
    }

    #[test]
    fn test_from_weights_clips_negatives() {
        let mut weights = BTreeMap::new();
        weights.insert(Emotion::Joy, 3.0);
        weights.insert(Emotion::Fear, 1.0);
        weights.insert(Emotion::Anger, -2.0);

        let dist = EmotionDistribution::from_weights(&weights).unwrap();
        assert_eq!(dist.get(Emotion::Joy), 0.75);
        assert_eq!(dist.get(Emotion::Fear), 0.25);
        assert_eq!(dist.get(Emotion::Anger), 0.0);
    }

    #[test]
    fn test_from_weights_all_non_positive() {
        let mut weights = BTreeMap::new();
        weights.insert(Emotion::Joy, -1.0);
        assert!(EmotionDistribution::from_weights(&weights).is_none());
    }

    #[test]
    fn test_dominant_prefers_earlier_category_on_tie() {
        assert_eq!(EmotionDistribution::uniform().dominant(), Emotion::Sadness);
    }
}
