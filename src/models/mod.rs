use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Display;

pub mod ad;
pub mod emotion;
pub mod feed;

pub use ad::{Ad, AdMetricEvent, AdMetricKind};
pub use emotion::{Emotion, EmotionDistribution};
pub use feed::{FeedItem, FeedResponse};

/// Timestamp as stored upstream, before normalization
///
/// Stores disagree on encoding: RFC 3339 strings, naive ISO strings,
/// human-readable export strings and unix seconds all occur.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawTimestamp {
    Seconds(i64),
    FractionalSeconds(f64),
    Text(String),
}

impl From<DateTime<Utc>> for RawTimestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        RawTimestamp::Text(dt.to_rfc3339())
    }
}

impl Display for RawTimestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RawTimestamp::Seconds(s) => write!(f, "{}", s),
            RawTimestamp::FractionalSeconds(s) => write!(f, "{}", s),
            RawTimestamp::Text(s) => write!(f, "{}", s),
        }
    }
}

/// Kind of user interaction with a content item or ad
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    View,
    Like,
    Comment,
    #[serde(alias = "post")]
    Create,
    Dislike,
    Ignore,
    AdClick,
    AdView,
    #[serde(other)]
    Other,
}

impl InteractionKind {
    /// Contribution of one interaction to the user's emotion pattern
    pub fn pattern_weight(&self) -> f64 {
        match self {
            InteractionKind::Like => 0.1,
            InteractionKind::Comment => 0.15,
            InteractionKind::Create => 0.2,
            InteractionKind::AdClick => 0.1,
            InteractionKind::AdView => 0.05,
            InteractionKind::Ignore => -0.03,
            InteractionKind::Dislike => -0.05,
            InteractionKind::View | InteractionKind::Other => 1.0,
        }
    }

    /// Contribution of one interaction to a content item's engagement boost
    pub fn engagement_weight(&self) -> f64 {
        match self {
            InteractionKind::View | InteractionKind::Other => 0.1,
            other => other.pattern_weight(),
        }
    }

    /// Whether the interaction signals interest in the content's keywords
    pub fn is_positive(&self) -> bool {
        !matches!(self, InteractionKind::Dislike | InteractionKind::Ignore)
    }
}

fn default_confidence() -> f64 {
    0.5
}

/// A user's emotional interaction with a content item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    #[serde(alias = "userId")]
    pub user_id: String,
    #[serde(alias = "contentId", alias = "postId")]
    pub content_id: String,
    /// Raw emotion label; unknown labels are skipped by every consumer
    pub emotion: String,
    #[serde(alias = "interactionType")]
    pub kind: InteractionKind,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    #[serde(default)]
    pub timestamp: Option<RawTimestamp>,
}

impl Interaction {
    pub fn emotion(&self) -> Option<Emotion> {
        Emotion::from_label(&self.emotion)
    }
}

/// A catalog content item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: String,
    /// Raw emotion label; items with unknown labels never enter a feed
    pub emotion: String,
    #[serde(default, alias = "created_at", alias = "createdAt")]
    pub published_at: Option<RawTimestamp>,
    #[serde(default)]
    pub likes: u64,
    #[serde(default, alias = "commentsCount")]
    pub comments: u64,
    #[serde(default)]
    pub views: u64,
    #[serde(default, alias = "content")]
    pub body: String,
    /// Explicit keywords; derived from the body when empty
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub topic: Option<String>,
}

impl ContentItem {
    pub fn emotion(&self) -> Option<Emotion> {
        Emotion::from_label(&self.emotion)
    }

    /// Popularity used to rank cold-start filler
    pub fn engagement_total(&self) -> u64 {
        self.likes
            .saturating_add(self.comments)
            .saturating_add(self.views)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interaction_deserializes_upstream_field_names() {
        let json = r#"{
            "userId": "u1",
            "postId": "p1",
            "emotion": "Neşe (Joy)",
            "interactionType": "like",
            "confidence": 0.9,
            "timestamp": "2024-05-01T12:00:00.000Z"
        }"#;

        let interaction: Interaction = serde_json::from_str(json).unwrap();
        assert_eq!(interaction.user_id, "u1");
        assert_eq!(interaction.content_id, "p1");
        assert_eq!(interaction.kind, InteractionKind::Like);
        assert_eq!(interaction.emotion(), Some(Emotion::Joy));
        assert_eq!(
            interaction.timestamp,
            Some(RawTimestamp::Text("2024-05-01T12:00:00.000Z".to_string()))
        );
    }

    #[test]
    fn test_interaction_defaults() {
        let json = r#"{"user_id": "u1", "content_id": "p1", "emotion": "fear", "kind": "share"}"#;

        let interaction: Interaction = serde_json::from_str(json).unwrap();
        assert_eq!(interaction.confidence, 0.5);
        assert_eq!(interaction.kind, InteractionKind::Other);
        assert!(interaction.timestamp.is_none());
    }

    #[test]
    fn test_raw_timestamp_untagged() {
        let n: RawTimestamp = serde_json::from_str("1714550400").unwrap();
        assert_eq!(n, RawTimestamp::Seconds(1714550400));

        let f: RawTimestamp = serde_json::from_str("1714550400.5").unwrap();
        assert_eq!(f, RawTimestamp::FractionalSeconds(1714550400.5));
    }

    #[test]
    fn test_kind_weights() {
        assert_eq!(InteractionKind::Dislike.pattern_weight(), -0.05);
        assert_eq!(InteractionKind::View.pattern_weight(), 1.0);
        assert_eq!(InteractionKind::View.engagement_weight(), 0.1);
        assert_eq!(InteractionKind::Comment.engagement_weight(), 0.15);
        assert!(!InteractionKind::Ignore.is_positive());
    }

    #[test]
    fn test_content_item_aliases() {
        let json = r#"{
            "id": "c1",
            "emotion": "love",
            "created_at": "2024-05-01",
            "commentsCount": 4,
            "likes": 10,
            "content": "A warm story"
        }"#;

        let item: ContentItem = serde_json::from_str(json).unwrap();
        assert_eq!(item.emotion(), Some(Emotion::Love));
        assert_eq!(item.engagement_total(), 14);
        assert_eq!(item.body, "A warm story");
        assert!(item.keywords.is_empty());
    }

    #[test]
    fn test_engagement_total_saturates() {
        let json = r#"{"id": "viral", "emotion": "joy", "likes": 18446744073709551615, "views": 10}"#;
        let item: ContentItem = serde_json::from_str(json).unwrap();
        assert_eq!(item.engagement_total(), u64::MAX);
    }
}
