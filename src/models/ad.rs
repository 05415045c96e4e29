use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Emotion, RawTimestamp};

fn default_priority() -> f64 {
    1.0
}

/// Kind of recorded ad metric event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdMetricKind {
    Impression,
    Click,
    View,
}

/// One appended ad metric event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdMetricEvent {
    pub kind: AdMetricKind,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub emotion_before: Option<Emotion>,
    #[serde(default)]
    pub emotion_after: Option<Emotion>,
}

/// An advertisement eligible for feed placement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ad {
    pub id: String,
    /// Raw emotion label the campaign targets
    #[serde(alias = "targetEmotion")]
    pub target_emotion: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default = "default_priority")]
    pub priority: f64,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default, alias = "start_date")]
    pub starts_at: Option<RawTimestamp>,
    #[serde(default, alias = "end_date")]
    pub ends_at: Option<RawTimestamp>,
    #[serde(default)]
    pub metrics: Vec<AdMetricEvent>,
}

impl Ad {
    pub fn target_emotion(&self) -> Option<Emotion> {
        Emotion::from_label(&self.target_emotion)
    }

    /// Active flag set and `now` inside the validity window
    ///
    /// A missing start is open-ended. A missing end counts as already
    /// expired, and an unparseable bound makes the ad ineligible.
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        if !self.is_active {
            return false;
        }

        let starts_ok = match &self.starts_at {
            None => true,
            Some(raw) => crate::services::timestamp::normalize(raw).is_some_and(|start| start <= now),
        };
        let ends_ok = match &self.ends_at {
            None => false,
            Some(raw) => crate::services::timestamp::normalize(raw).is_some_and(|end| end > now),
        };

        starts_ok && ends_ok
    }
}
