//! Keyword extraction, recent interests and overlap scoring

use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, HashSet};

use crate::models::{ContentItem, Interaction};
use crate::services::timestamp;

/// Words shorter than this never become keywords
const MIN_KEYWORD_LEN: usize = 3;

/// How far back interactions feed the user's recent keyword set
const RECENT_KEYWORD_DAYS: i64 = 7;

/// Lower-cased words of at least three characters, punctuation trimmed
pub fn extract(body: &str) -> HashSet<String> {
    body.split_whitespace()
        .map(|word| {
            word.trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase()
        })
        .filter(|word| word.chars().count() >= MIN_KEYWORD_LEN)
        .collect()
}

/// Keyword set of a content item; derived from the body when none are set
pub fn for_item(item: &ContentItem) -> HashSet<String> {
    if item.keywords.is_empty() {
        extract(&item.body)
    } else {
        normalize(&item.keywords)
    }
}

/// Lower-cases and trims an explicit keyword list
pub fn normalize(keywords: &[String]) -> HashSet<String> {
    keywords
        .iter()
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect()
}

/// Keywords of content the user engaged with positively in the last week
///
/// Interactions without a resolvable timestamp are left out.
pub fn recent_for_user(
    interactions: &[Interaction],
    catalog: &HashMap<&str, &ContentItem>,
    now: DateTime<Utc>,
) -> HashSet<String> {
    let cutoff = now - Duration::days(RECENT_KEYWORD_DAYS);

    interactions
        .iter()
        .filter(|i| i.kind.is_positive())
        .filter(|i| {
            timestamp::normalize_opt(i.timestamp.as_ref()).is_some_and(|ts| ts >= cutoff)
        })
        .filter_map(|i| catalog.get(i.content_id.as_str()))
        .flat_map(|item| for_item(item))
        .collect()
}

/// Jaccard similarity; zero when either set is empty
pub fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count() as f64;
    let union = a.union(b).count() as f64;
    intersection / union
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{InteractionKind, RawTimestamp};

    fn item(id: &str, body: &str, keywords: &[&str]) -> ContentItem {
        ContentItem {
            id: id.to_string(),
            emotion: "joy".to_string(),
            published_at: None,
            likes: 0,
            comments: 0,
            views: 0,
            body: body.to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            topic: None,
        }
    }

    fn interaction(content_id: &str, kind: InteractionKind, at: DateTime<Utc>) -> Interaction {
        Interaction {
            user_id: "u1".to_string(),
            content_id: content_id.to_string(),
            emotion: "joy".to_string(),
            kind,
            confidence: 0.5,
            timestamp: Some(RawTimestamp::from(at)),
        }
    }

    #[test]
    fn test_extract_strips_punctuation_and_short_words() {
        let words = extract("Sunny day, at the Beach!! ok");
        let expected: HashSet<String> = ["sunny", "day", "the", "beach"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(words, expected);
    }

    #[test]
    fn test_explicit_keywords_take_precedence() {
        let with_keywords = item("c1", "long body text", &["Travel", " beach "]);
        let set = for_item(&with_keywords);
        assert!(set.contains("travel"));
        assert!(set.contains("beach"));
        assert!(!set.contains("body"));
    }

    #[test]
    fn test_recent_for_user_skips_old_and_negative() {
        let now = Utc::now();
        let fresh = item("c1", "mountain hiking", &[]);
        let stale = item("c2", "ocean sailing", &[]);
        let disliked = item("c3", "horror movie", &[]);
        let catalog: HashMap<&str, &ContentItem> = [&fresh, &stale, &disliked]
            .into_iter()
            .map(|i| (i.id.as_str(), i))
            .collect();

        let interactions = vec![
            interaction("c1", InteractionKind::Like, now - Duration::hours(3)),
            interaction("c2", InteractionKind::Like, now - Duration::days(30)),
            interaction("c3", InteractionKind::Dislike, now),
        ];

        let recent = recent_for_user(&interactions, &catalog, now);
        assert!(recent.contains("mountain"));
        assert!(!recent.contains("ocean"));
        assert!(!recent.contains("horror"));
    }

    #[test]
    fn test_jaccard() {
        let a = extract("red green blue");
        let b = extract("green blue yellow");
        assert!((jaccard(&a, &b) - 0.5).abs() < 1e-12);
        assert_eq!(jaccard(&a, &HashSet::new()), 0.0);
    }
}
