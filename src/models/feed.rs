use serde::{Deserialize, Serialize};

use super::{Emotion, EmotionDistribution};

/// One display slot of a generated feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FeedItem {
    Content { id: String, emotion: Emotion },
    Ad { id: String, emotion: Option<Emotion> },
}

impl FeedItem {
    pub fn id(&self) -> &str {
        match self {
            FeedItem::Content { id, .. } | FeedItem::Ad { id, .. } => id,
        }
    }

    pub fn emotion(&self) -> Option<Emotion> {
        match self {
            FeedItem::Content { emotion, .. } => Some(*emotion),
            FeedItem::Ad { emotion, .. } => *emotion,
        }
    }

    pub fn is_ad(&self) -> bool {
        matches!(self, FeedItem::Ad { .. })
    }
}

/// Result of a feed generation request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedResponse {
    /// Items in display order
    pub feed: Vec<FeedItem>,
    pub emotion_distribution: EmotionDistribution,
    pub current_emotion: Option<Emotion>,
    /// Position the ad was planned for; `None` when no peak exists
    pub peak_ad_index: Option<usize>,
}

impl FeedResponse {
    /// Content ids in display order, ads excluded
    pub fn content_ids(&self) -> Vec<&str> {
        self.feed
            .iter()
            .filter(|item| !item.is_ad())
            .map(FeedItem::id)
            .collect()
    }

    pub fn ad_position(&self) -> Option<usize> {
        self.feed.iter().position(FeedItem::is_ad)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feed_item_serialization_tags_type() {
        let item = FeedItem::Content {
            id: "c1".to_string(),
            emotion: Emotion::Joy,
        };
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["type"], "content");
        assert_eq!(json["emotion"], "joy");

        let ad = FeedItem::Ad {
            id: "ad1".to_string(),
            emotion: None,
        };
        let json = serde_json::to_value(&ad).unwrap();
        assert_eq!(json["type"], "ad");
    }

    #[test]
    fn test_response_helpers() {
        let response = FeedResponse {
            feed: vec![
                FeedItem::Content { id: "c1".to_string(), emotion: Emotion::Joy },
                FeedItem::Ad { id: "ad1".to_string(), emotion: Some(Emotion::Joy) },
                FeedItem::Content { id: "c2".to_string(), emotion: Emotion::Fear },
            ],
            emotion_distribution: EmotionDistribution::uniform(),
            current_emotion: Some(Emotion::Joy),
            peak_ad_index: Some(1),
        };

        assert_eq!(response.content_ids(), vec!["c1", "c2"]);
        assert_eq!(response.ad_position(), Some(1));
    }
}
