//! Catalog resolution and priority tiers of feed candidates
//!
//! Tiers are consulted strictly in [`PoolTier::ORDER`]; a tier is only
//! built when the ones before it could not cover the request.

use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, HashSet};

use crate::models::{ContentItem, Emotion};
use crate::services::{keywords, timestamp};

/// Age under which unseen content counts as fresh
pub const FRESH_WINDOW_DAYS: i64 = 7;

/// A catalog item with its emotion, publish time and keywords resolved
#[derive(Debug, Clone)]
pub struct CatalogEntry<'a> {
    pub item: &'a ContentItem,
    pub emotion: Emotion,
    pub published_at: Option<DateTime<Utc>>,
    pub keywords: HashSet<String>,
}

impl CatalogEntry<'_> {
    pub fn id(&self) -> &str {
        &self.item.id
    }
}

/// Resolves catalog items, skipping malformed ones
///
/// Items with an empty id or unknown emotion are dropped, as are later
/// duplicates of an id already seen.
pub fn resolve_catalog(items: &[ContentItem]) -> Vec<CatalogEntry<'_>> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut entries = Vec::with_capacity(items.len());

    for item in items {
        if item.id.trim().is_empty() {
            tracing::warn!("Skipping catalog item without id");
            continue;
        }
        let Some(emotion) = item.emotion() else {
            tracing::warn!(content_id = %item.id, emotion = %item.emotion, "Skipping catalog item with unknown emotion");
            continue;
        };
        if !seen.insert(item.id.as_str()) {
            tracing::warn!(content_id = %item.id, "Skipping duplicate catalog item");
            continue;
        }

        entries.push(CatalogEntry {
            item,
            emotion,
            published_at: timestamp::normalize_opt(item.published_at.as_ref()),
            keywords: keywords::for_item(item),
        });
    }

    entries
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PoolTier {
    /// Not shown recently and published within the fresh window
    FreshUnseen,
    /// Not shown recently, any age
    AnyUnseen,
    /// Coverage of every emotion, then the most engaging items
    ColdStart,
    /// Everything previously shown, least recently shown first
    Repeat,
}

impl PoolTier {
    pub const ORDER: [PoolTier; 4] = [
        PoolTier::FreshUnseen,
        PoolTier::AnyUnseen,
        PoolTier::ColdStart,
        PoolTier::Repeat,
    ];
}

/// An entry drawn from a tier, by index into the resolved catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolCandidate {
    pub index: usize,
    pub tier: PoolTier,
}

pub struct ContentPools<'c, 'a> {
    entries: &'c [CatalogEntry<'a>],
    /// Shown id -> recency rank, 0 being the most recently shown
    shown: HashMap<&'c str, usize>,
    now: DateTime<Utc>,
}

impl<'c, 'a> ContentPools<'c, 'a> {
    /// `shown_ids` is ordered most recent first
    pub fn new(entries: &'c [CatalogEntry<'a>], shown_ids: &'c [String], now: DateTime<Utc>) -> Self {
        let mut shown = HashMap::new();
        for (rank, id) in shown_ids.iter().enumerate() {
            shown.entry(id.as_str()).or_insert(rank);
        }
        Self { entries, shown, now }
    }

    pub fn entries(&self) -> &'c [CatalogEntry<'a>] {
        self.entries
    }

    pub fn is_shown(&self, index: usize) -> bool {
        self.shown.contains_key(self.entries[index].id())
    }

    fn is_fresh(&self, index: usize) -> bool {
        self.entries[index]
            .published_at
            .is_some_and(|at| self.now - at <= Duration::days(FRESH_WINDOW_DAYS))
    }

    /// Members of one tier in pool order, skipping `taken`
    pub fn tier_members(&self, tier: PoolTier, taken: &HashSet<usize>, target: usize) -> Vec<usize> {
        let available = (0..self.entries.len()).filter(|i| !taken.contains(i));

        match tier {
            PoolTier::FreshUnseen => {
                let mut members: Vec<usize> = available
                    .filter(|&i| !self.is_shown(i) && self.is_fresh(i))
                    .collect();
                self.sort_newest_first(&mut members);
                members
            }
            PoolTier::AnyUnseen => {
                let mut members: Vec<usize> = available.filter(|&i| !self.is_shown(i)).collect();
                self.sort_newest_first(&mut members);
                members
            }
            PoolTier::ColdStart => self.cold_start_members(available.collect(), target),
            PoolTier::Repeat => {
                let mut members: Vec<usize> = available.filter(|&i| self.is_shown(i)).collect();
                members.sort_by_key(|&i| std::cmp::Reverse(self.shown.get(self.entries[i].id()).copied()));
                members
            }
        }
    }

    /// One most-engaging item per emotion, then the most engaging of the rest
    /// until `target` members are collected
    fn cold_start_members(&self, mut available: Vec<usize>, target: usize) -> Vec<usize> {
        available.sort_by(|&a, &b| {
            let ea = self.entries[a].item.engagement_total();
            let eb = self.entries[b].item.engagement_total();
            eb.cmp(&ea).then_with(|| self.entries[a].id().cmp(self.entries[b].id()))
        });

        let mut members = Vec::new();
        let mut covered: HashSet<Emotion> = HashSet::new();
        for &i in &available {
            if covered.insert(self.entries[i].emotion) {
                members.push(i);
            }
        }

        for &i in &available {
            if members.len() >= target.max(covered.len()) {
                break;
            }
            if !members.contains(&i) {
                members.push(i);
            }
        }

        members
    }

    fn sort_newest_first(&self, members: &mut [usize]) {
        // Stable: equal or missing publish times keep catalog order
        members.sort_by_key(|&i| std::cmp::Reverse(self.entries[i].published_at));
    }

    /// All unseen entries, fresh ones first
    pub fn unseen(&self) -> Vec<usize> {
        let mut taken = HashSet::new();
        let mut members = self.tier_members(PoolTier::FreshUnseen, &taken, 0);
        taken.extend(members.iter().copied());
        members.extend(self.tier_members(PoolTier::AnyUnseen, &taken, 0));
        members
    }

    /// Draws candidates tier by tier until at least `needed` are collected
    ///
    /// The tier that crosses the threshold is included whole so scoring
    /// can choose among it.
    pub fn draw(&self, needed: usize, exclude: &HashSet<usize>, target: usize) -> Vec<PoolCandidate> {
        let mut taken = exclude.clone();
        let mut drawn = Vec::new();

        for tier in PoolTier::ORDER {
            if drawn.len() >= needed {
                break;
            }
            for index in self.tier_members(tier, &taken, target) {
                taken.insert(index);
                drawn.push(PoolCandidate { index, tier });
            }
        }

        drawn
    }

    /// Every remaining entry, tagged with the tier it belongs to
    pub fn draw_all(&self, exclude: &HashSet<usize>, target: usize) -> Vec<PoolCandidate> {
        self.draw(usize::MAX, exclude, target)
    }
}
