//! Process-wide engagement counts feeding the relevance score

use std::collections::HashMap;

use crate::models::InteractionKind;

/// Append-only per-content interaction counts
///
/// Shared across requests behind a lock owned by the feed engine; entries
/// are never removed for the life of the process.
#[derive(Debug, Default, Clone)]
pub struct EngagementTally {
    counts: HashMap<String, HashMap<InteractionKind, u64>>,
}

impl EngagementTally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, content_id: &str, kind: InteractionKind) {
        *self
            .counts
            .entry(content_id.to_string())
            .or_default()
            .entry(kind)
            .or_insert(0) += 1;
    }

    /// Weighted mean engagement of an item, capped at 1; zero when unseen
    pub fn boost(&self, content_id: &str) -> f64 {
        let Some(kinds) = self.counts.get(content_id) else {
            return 0.0;
        };

        let total: u64 = kinds.values().sum();
        if total == 0 {
            return 0.0;
        }

        let weighted: f64 = kinds
            .iter()
            .map(|(kind, count)| *count as f64 * kind.engagement_weight())
            .sum();

        (weighted / total as f64).min(1.0)
    }

    pub fn count(&self, content_id: &str, kind: InteractionKind) -> u64 {
        self.counts
            .get(content_id)
            .and_then(|kinds| kinds.get(&kind))
            .copied()
            .unwrap_or(0)
    }
}
